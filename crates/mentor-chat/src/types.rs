//! Request and response shapes for the chat pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mentor_core::types::{Hint, SourceRef};

/// An incoming chat message with optional thread and hint fields.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub thread_id: Option<Uuid>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            thread_id: None,
            grade: None,
            subject: None,
        }
    }

    /// The retrieval/framing hint carried by this request.
    pub fn hint(&self) -> Hint {
        Hint::new(self.grade.clone(), self.subject.clone())
    }
}

/// The outcome of one chat turn.
///
/// `generation_failed` distinguishes "the backend could not be reached"
/// (response holds the fixed apology, no assistant message was persisted)
/// from a successful turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub response: String,
    pub thread_id: Uuid,
    pub sources: Vec<SourceRef>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub generation_failed: bool,
}

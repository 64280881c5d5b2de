//! Shared domain types: knowledge entries, conversation threads and
//! messages, retrieval hits, and the optional grade/subject hint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Knowledge entries
// =============================================================================

/// A curated Q&A entry in the knowledge base.
///
/// The relational record is authoritative; the entry's vector representation
/// is a derived projection that can always be rebuilt from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: Uuid,
    pub title: String,
    pub question: String,
    pub answer_markdown: String,
    pub content_markdown: String,
    pub subject: Option<String>,
    pub grade_level: Option<String>,
    pub difficulty: Option<String>,
    pub category: String,
    pub tags: Vec<String>,
    /// Higher priority entries are preferred by keyword retrieval.
    pub priority: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    /// The answer text used for prompt context: the curated answer when
    /// present, otherwise the long-form content.
    pub fn context_answer(&self) -> &str {
        if !self.answer_markdown.is_empty() {
            &self.answer_markdown
        } else {
            &self.content_markdown
        }
    }

    /// The text embedded for semantic search.
    pub fn search_text(&self) -> String {
        [
            self.title.as_str(),
            self.question.as_str(),
            self.answer_markdown.as_str(),
            self.content_markdown.as_str(),
        ]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Input shape for creating or updating a knowledge entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeDraft {
    pub title: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer_markdown: String,
    #[serde(default)]
    pub content_markdown: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Option<i64>,
}

impl KnowledgeDraft {
    /// Enforce the entry invariant: a non-empty title and at least one of
    /// the answer or content bodies.
    pub fn validate(&self) -> Result<(), crate::error::MentorError> {
        if self.title.trim().is_empty() {
            return Err(crate::error::MentorError::Validation(
                "Title is required".to_string(),
            ));
        }
        if self.answer_markdown.trim().is_empty() && self.content_markdown.trim().is_empty() {
            return Err(crate::error::MentorError::Validation(
                "An answer or content body is required".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Retrieval
// =============================================================================

/// Optional (grade, subject) pair narrowing retrieval and framing generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hint {
    pub grade_level: Option<String>,
    pub subject: Option<String>,
}

impl Hint {
    pub fn new(grade_level: Option<String>, subject: Option<String>) -> Self {
        Self {
            grade_level,
            subject,
        }
    }

    /// True when neither constraint is present (unrestricted search).
    pub fn is_empty(&self) -> bool {
        self.grade_level.is_none() && self.subject.is_none()
    }
}

/// How a retrieval hit was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Keyword,
    Vector,
}

/// One entry in the ranked context set.
///
/// Keyword hits carry a priority-derived score and vector hits a cosine
/// similarity; the two scales are not comparable. Rank position, not score
/// magnitude, is what downstream consumers read.
#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub entry: KnowledgeEntry,
    pub score: f64,
    pub match_kind: MatchKind,
}

// =============================================================================
// Conversations
// =============================================================================

/// A persistent conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Sender::User),
            "assistant" => Some(Sender::Assistant),
            _ => None,
        }
    }
}

/// A source attribution attached to an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub excerpt: String,
}

/// A single message within a thread. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender: Sender,
    pub content: String,
    /// Source attributions; present only on assistant messages.
    pub sources: Option<Vec<SourceRef>>,
    pub timestamp: DateTime<Utc>,
}

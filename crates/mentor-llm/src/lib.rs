//! Mentor LLM crate - the text-generation backend boundary.
//!
//! Defines the `TextGenerator` trait consumed by the title and answer
//! composers, an OpenAI-compatible HTTP client, and a deterministic mock
//! for tests.

pub mod mock;
pub mod openai;

use async_trait::async_trait;

use mentor_core::error::MentorError;

/// Role tag for a chat message sent to the generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A role-tagged message in a generation request.
#[derive(Debug, Clone)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A request to the text-generation backend.
///
/// The same backend serves two configurations: short, low-variance title
/// generation (~30 tokens) and longer conversational answers (~500-1000).
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub messages: Vec<PromptMessage>,
    pub max_output_tokens: u32,
    pub temperature: f64,
}

/// Text-generation backend boundary.
///
/// Implementations return exactly one completion string; all failures
/// surface as `MentorError::GenerationFailed`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, MentorError>;
}

pub use mock::MockGenerator;
pub use openai::OpenAiCompatClient;

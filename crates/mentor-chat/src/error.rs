//! Error types for the conversational core.

use mentor_core::error::MentorError;

/// Errors from the chat pipeline.
///
/// Retrieval failures never appear here; they are absorbed into empty
/// context. Answer-generation failure is not an error either — it travels
/// as a flag on the turn so the caller can distinguish it from a
/// successful-but-unhelpful answer.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("thread not found: {0}")]
    ThreadNotFound(uuid::Uuid),
    #[error("storage error: {0}")]
    StorageError(String),
}

impl From<MentorError> for ChatError {
    fn from(err: MentorError) -> Self {
        ChatError::StorageError(err.to_string())
    }
}

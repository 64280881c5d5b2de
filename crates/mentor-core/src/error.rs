use thiserror::Error;

/// Top-level error type for the Mentor system.
///
/// Each variant maps to one failure domain. Subsystem crates convert their
/// own error types into `MentorError` so that the `?` operator works
/// seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MentorError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The relational knowledge/thread store could not be reached or the
    /// query failed. Retrieval callers downgrade this to "no results".
    #[error("Knowledge store unavailable: {0}")]
    StoreUnavailable(String),

    /// The vector index or its embedding backend failed. Retrieval callers
    /// downgrade this to "no results".
    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// An embedding did not match the index's configured dimensionality.
    /// The write must stop before it reaches the index.
    #[error("Embedding dimension mismatch: got {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The text-generation backend failed or timed out.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Invalid input; the only error raised before any side effect.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for MentorError {
    fn from(err: toml::de::Error) -> Self {
        MentorError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MentorError {
    fn from(err: toml::ser::Error) -> Self {
        MentorError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MentorError {
    fn from(err: serde_json::Error) -> Self {
        MentorError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Mentor operations.
pub type Result<T> = std::result::Result<T, MentorError>;

//! Error types for Recollect operations

use std::time::Duration;

/// Result type for Recollect operations
pub type Result<T> = std::result::Result<T, RecollectError>;

/// Error types for the consolidation engine and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum RecollectError {
    /// Store unreachable or returned nothing usable
    #[error("Data fetch error: {0}")]
    DataFetch(String),

    /// Text generation failed
    #[error("Generation error: {0}")]
    Generation(String),

    /// Text generation did not finish in time
    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    /// Invalid input from the caller
    #[error("Validation error: {0}")]
    Validation(String),

    /// Store write failed
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl RecollectError {
    /// Whether this error came from the text generation collaborator.
    pub fn is_generation(&self) -> bool {
        matches!(self, Self::Generation(_) | Self::GenerationTimeout(_))
    }
}

impl From<String> for RecollectError {
    fn from(s: String) -> Self {
        RecollectError::Other(s)
    }
}

impl From<&str> for RecollectError {
    fn from(s: &str) -> Self {
        RecollectError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for RecollectError {
    fn from(err: anyhow::Error) -> Self {
        RecollectError::Other(err.to_string())
    }
}

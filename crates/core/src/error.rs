//! Error types for casevault.
//!
//! A single error enum covers every category the workspace deals with:
//! configuration, I/O, caller contract violations, the embedding and vector
//! index collaborators, and ingestion.

use thiserror::Error;

/// Unified error type for casevault.
///
/// All fallible functions return `Result<T, AppError>`. Errors raised by an
/// external collaborator (embedding provider, vector index) are created once,
/// at the collaborator boundary, and then propagated unchanged.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A caller broke an input precondition (e.g. zero chunk size)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Embedding provider failures
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index failures
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// Ingestion pipeline and queue errors
    #[error("Ingest error: {0}")]
    Ingest(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_display() {
        let err = AppError::InvalidInput("chunk_tokens must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid input: chunk_tokens must be positive"
        );
    }

    #[test]
    fn test_from_serde_json() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[test]
    fn test_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AppError = io.into();
        assert!(err.to_string().starts_with("I/O error"));
    }
}

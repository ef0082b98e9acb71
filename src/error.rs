// src/error.rs
// Error kinds for the recall core

use thiserror::Error;

/// Main error type for repository, engine and embedding calls
#[derive(Error, Debug)]
pub enum RecallError {
    /// Engine or embedding provider unreachable
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed input: empty embedding, dimension mismatch, missing field, empty query
    #[error("validation error: {0}")]
    Validation(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The engine answered but rejected the request
    #[error("engine error (code {code}): {message}")]
    Engine { code: i64, message: String },

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for Result using RecallError
pub type Result<T> = std::result::Result<T, RecallError>;

impl RecallError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RecallError::Timeout(_))
    }

    /// Transient failures a caller outside the recall path may retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RecallError::Connection(_) | RecallError::Timeout(_) | RecallError::Http(_)
        )
    }
}

impl From<reqwest::Error> for RecallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RecallError::Timeout(err.to_string())
        } else if err.is_connect() {
            RecallError::Connection(err.to_string())
        } else {
            RecallError::Http(err)
        }
    }
}

impl From<tokio::time::error::Elapsed> for RecallError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        RecallError::Timeout(err.to_string())
    }
}

//! Error types for the AI module

use thiserror::Error;

/// AI module error types
#[derive(Error, Debug)]
pub enum AiError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("provider '{0}' is not available")]
    Unavailable(String),

    #[error("invalid response format: {0}")]
    InvalidFormat(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for AI operations
pub type Result<T> = std::result::Result<T, AiError>;

//! Error types for Posture Flux

use thiserror::Error;

/// Errors that can occur while tracking posture state
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse sample record: {0}")]
    ParseError(String),

    #[error("Inconsistent tracker state: {0}")]
    StateError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

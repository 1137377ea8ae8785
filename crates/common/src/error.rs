//! Error types for mockwright

use thiserror::Error;

/// Result type alias using mockwright Error
pub type Result<T> = std::result::Result<T, Error>;

/// mockwright error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Invalid HAR content in {path}: {reason}")]
    InvalidHar { path: String, reason: String },

    #[error("Resource not found: {kind} {id}")]
    NotFound { kind: String, id: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

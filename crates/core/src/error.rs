//! Error types for the serializer.

use thiserror::Error;

/// Errors that can abort a serialization run.
#[derive(Debug, Error)]
pub enum SerializerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("invalid export: {0}")]
    InvalidExport(String),

    /// A window reached serialization with a message that was never resolved.
    #[error("context for message {message} in window {window} was never resolved")]
    UnresolvedContext { window: usize, message: String },

    #[error("window {0} has no messages")]
    EmptyWindow(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SerializerError>;

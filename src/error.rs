//! Error types for the tax assistant

use thiserror::Error;

/// Result type alias for tax assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the tax assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Webhook request failed or returned a non-success status
    #[error("webhook error: {0}")]
    Webhook(String),

    /// Webhook reply body could not be interpreted
    #[error("reply error: {0}")]
    Reply(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Speech recognition is not available on this machine
    #[error("{0}")]
    SpeechUnavailable(String),

    /// Clipboard error
    #[error("clipboard error: {0}")]
    Clipboard(String),

    /// Settings storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML encoding error
    #[error("toml encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
}

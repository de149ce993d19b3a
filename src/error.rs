//! Error types for Mailsense

use thiserror::Error;

/// Result type alias for Mailsense operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Mailsense
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("{0} is no longer running")]
    ChannelClosed(&'static str),
}

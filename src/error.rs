//! Error types shared by the channel, store and operation log

use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the sync engine
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Reconnect attempts exhausted after {attempts} retries")]
    ReconnectExhausted { attempts: u32 },

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Push channel is not connected")]
    NotConnected,

    #[error("Fetch failed with status {status}")]
    FetchFailed { status: u16 },

    #[error("Request error: {0}")]
    Request(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        SyncError::InvalidOperation(message.into())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => SyncError::FetchFailed {
                status: status.as_u16(),
            },
            None if e.is_timeout() => SyncError::Request(format!("Request timeout: {}", e)),
            None if e.is_connect() => SyncError::Request(format!("Connection error: {}", e)),
            None => SyncError::Request(e.to_string()),
        }
    }
}

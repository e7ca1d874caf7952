use crate::protocol::{DecodeError, FramerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure to open a connection to the time server
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Failed to resolve {target}: {source}")]
    Resolve {
        target: String,
        source: std::io::Error,
    },

    #[error("Connection to {target} refused")]
    Refused { target: String },

    #[error("Connection to {target} timed out")]
    TimedOut { target: String },

    #[error("Remote {target} unreachable: {source}")]
    Unreachable {
        target: String,
        source: std::io::Error,
    },

    #[error("Unable to create a local socket: {0}")]
    LocalResources(std::io::Error),
}

impl ConnectError {
    /// Whether the failure is local resource exhaustion rather than the remote.
    pub fn is_local(&self) -> bool {
        matches!(self, ConnectError::LocalResources(_))
    }
}

/// Reasons a single client session was aborted
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Framing failed: {0}")]
    Framing(#[from] FramerError),

    #[error("Malformed timestamp: {0}")]
    Decode(#[from] DecodeError),

    #[error("Shutdown requested")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ClientError>;

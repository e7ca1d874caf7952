use crate::clock::ClockError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to sample the local clock: {0}")]
    Clock(#[from] ClockError),

    #[error("Failed to start connection worker: {0}")]
    Spawn(std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;

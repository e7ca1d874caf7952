use thiserror::Error;

/// Errors produced while decoding a timestamp line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Missing comma separator in timestamp line")]
    MissingComma,

    #[error("Invalid seconds field: {0:?}")]
    InvalidSeconds(String),

    #[error("Invalid microseconds field: {0:?}")]
    InvalidMicroseconds(String),
}

/// Errors produced while framing a message from a byte stream
#[derive(Debug, Error)]
pub enum FramerError {
    #[error("Timed out waiting for a complete message")]
    Timeout,

    #[error("Message exceeded {max_bytes} bytes without a terminator")]
    TooLong { max_bytes: usize },

    #[error("Connection closed by peer after {received} byte(s) without a terminator")]
    ConnectionClosed { received: usize },

    #[error("Socket error while framing: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

//! Wire protocol: timestamp codec and line framing

pub mod error;
pub mod framer;
pub mod message;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{DecodeError, FramerError, Result as ProtocolResult};
pub use framer::{FrameSource, Framer, FramerLimits};
pub use message::{TimestampMessage, MAX_MESSAGE_SIZE, TERMINATOR};

//! Line framing over a byte stream.
//!
//! A [`Framer`] pulls small chunks from a [`FrameSource`] until the buffer
//! holds a `\r\n` terminator. Every read is bounded by `read_timeout`, re-armed
//! per read, and the whole message is bounded by `message_timeout` and
//! `max_bytes`. Reads are armed in short slices so a shutdown request is
//! noticed promptly; a cancelled read surfaces as [`FramerError::Timeout`].

use crate::protocol::error::FramerError;
use crate::protocol::message::{MAX_MESSAGE_SIZE, TERMINATOR};
use crate::shutdown::{ShutdownToken, POLL_INTERVAL};
use std::io::{self, ErrorKind, Read};
use std::net::TcpStream;
use std::time::{Duration, Instant};
use tracing::debug;

/// Bytes requested per read call
const READ_CHUNK_SIZE: usize = 16;

/// A readable stream whose blocking reads can be bounded in time
pub trait FrameSource: Read {
    /// Bound the next blocking read to `timeout` (always non-zero).
    fn arm_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl FrameSource for TcpStream {
    fn arm_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))
    }
}

/// Size and time bounds applied to one framed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramerLimits {
    pub max_bytes: usize,
    pub read_timeout: Duration,
    pub message_timeout: Duration,
}

impl Default for FramerLimits {
    fn default() -> Self {
        Self {
            max_bytes: MAX_MESSAGE_SIZE,
            read_timeout: Duration::from_secs(8),
            message_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Framer {
    limits: FramerLimits,
    poll_interval: Duration,
}

impl Framer {
    pub fn new(limits: FramerLimits) -> Self {
        Self {
            limits,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Overrides how often a blocked read re-checks the shutdown token.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub fn limits(&self) -> &FramerLimits {
        &self.limits
    }

    /// Reads exactly one line, returning the bytes up to and including the
    /// terminator. Bytes after the terminator are discarded.
    pub fn read_message<S: FrameSource>(
        &self,
        source: &mut S,
        shutdown: &ShutdownToken,
    ) -> Result<Vec<u8>, FramerError> {
        // A timeout too large to represent leaves that bound unenforced.
        let message_deadline = Instant::now().checked_add(self.limits.message_timeout);
        let mut buffer: Vec<u8> = Vec::with_capacity(self.limits.max_bytes.min(MAX_MESSAGE_SIZE));
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            let read = self.read_chunk(source, &mut chunk, message_deadline, shutdown, buffer.len())?;
            // The terminator may straddle two chunks.
            let search_from = buffer.len().saturating_sub(1);
            buffer.extend_from_slice(&chunk[..read]);

            if let Some(pos) = find_terminator(&buffer[search_from..]) {
                let end = search_from + pos + TERMINATOR.len();
                if end > self.limits.max_bytes {
                    return Err(self.too_long(end));
                }
                buffer.truncate(end);
                debug!(bytes = end, "Message framed");
                return Ok(buffer);
            }

            if buffer.len() >= self.limits.max_bytes {
                return Err(self.too_long(buffer.len()));
            }
        }
    }

    fn read_chunk<S: FrameSource>(
        &self,
        source: &mut S,
        chunk: &mut [u8],
        message_deadline: Option<Instant>,
        shutdown: &ShutdownToken,
        received: usize,
    ) -> Result<usize, FramerError> {
        let read_deadline = Instant::now().checked_add(self.limits.read_timeout);
        let read_deadline = match (read_deadline, message_deadline) {
            (Some(read), Some(message)) => Some(read.min(message)),
            (read, message) => read.or(message),
        };

        loop {
            if shutdown.is_requested() {
                debug!(received, "Shutdown requested while framing");
                return Err(FramerError::Timeout);
            }

            let slice = match read_deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        debug!(received, "Read deadline elapsed");
                        return Err(FramerError::Timeout);
                    }
                    remaining.min(self.poll_interval)
                }
                None => self.poll_interval,
            };
            source.arm_read_timeout(slice)?;

            match source.read(chunk) {
                Ok(0) => return Err(FramerError::ConnectionClosed { received }),
                Ok(n) => return Ok(n),
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) =>
                {
                    continue
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
                    ) =>
                {
                    debug!(error = %e, received, "Connection dropped while framing");
                    return Err(FramerError::ConnectionClosed { received });
                }
                Err(e) => return Err(FramerError::Io(e)),
            }
        }
    }

    fn too_long(&self, seen: usize) -> FramerError {
        debug!(seen, max_bytes = self.limits.max_bytes, "Message too long");
        FramerError::TooLong {
            max_bytes: self.limits.max_bytes,
        }
    }
}

fn find_terminator(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(TERMINATOR.len())
        .position(|window| window == TERMINATOR)
}

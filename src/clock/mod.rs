//! Host clock access.
//!
//! [`Clock`] is the seam between the protocol engine and the operating
//! system: reading the wall clock, stepping it, and slewing it.

pub mod system;

use crate::protocol::TimestampMessage;
use thiserror::Error;

pub use system::{ObserveOnlyClock, SystemClock};

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("Failed to read the local clock: {0}")]
    Read(std::io::Error),

    #[error("Failed to set the local clock: {0}")]
    Set(std::io::Error),

    #[error("Failed to slew the local clock: {0}")]
    Slew(std::io::Error),

    #[error("Clock operation not supported on this platform: {0}")]
    Unsupported(&'static str),
}

/// Signed difference between a corrected remote time and the local clock.
///
/// Seconds and microseconds are differenced independently; neither field is
/// carried into the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    pub seconds: i64,
    pub microseconds: i64,
}

impl Offset {
    pub fn new(seconds: i64, microseconds: i64) -> Self {
        Self {
            seconds,
            microseconds,
        }
    }

    /// `remote - local`, field by field.
    pub fn between(remote: TimestampMessage, local: TimestampMessage) -> Self {
        Self {
            seconds: remote.seconds.saturating_sub(local.seconds),
            microseconds: remote.microseconds.saturating_sub(local.microseconds),
        }
    }

    /// The offset as a single signed microsecond count.
    pub fn as_micros(&self) -> i128 {
        TimestampMessage::new(self.seconds, self.microseconds).as_micros()
    }
}

/// Wall-clock facility used by the client and the server
pub trait Clock: Send + Sync {
    /// Sample the current wall-clock time.
    fn current_local_time(&self) -> Result<TimestampMessage, ClockError>;

    /// Step the clock to `time` at once.
    fn set_local_time(&self, time: TimestampMessage) -> Result<(), ClockError>;

    /// Gradually move the clock by `offset`.
    fn slew_local_time(&self, offset: Offset) -> Result<(), ClockError>;
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn current_local_time(&self) -> Result<TimestampMessage, ClockError> {
        (**self).current_local_time()
    }

    fn set_local_time(&self, time: TimestampMessage) -> Result<(), ClockError> {
        (**self).set_local_time(time)
    }

    fn slew_local_time(&self, offset: Offset) -> Result<(), ClockError> {
        (**self).slew_local_time(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        pub Clock {}

        impl Clock for Clock {
            fn current_local_time(&self) -> Result<TimestampMessage, ClockError>;
            fn set_local_time(&self, time: TimestampMessage) -> Result<(), ClockError>;
            fn slew_local_time(&self, offset: Offset) -> Result<(), ClockError>;
        }
    }

    #[test]
    fn test_offset_fields_are_independent() {
        let offset = Offset::between(
            TimestampMessage::new(100, 200),
            TimestampMessage::new(99, 900_000),
        );
        assert_eq!(offset, Offset::new(1, -899_800));
        assert_eq!(offset.as_micros(), 100_200);
    }

    #[test]
    fn test_offset_saturates() {
        let offset = Offset::between(
            TimestampMessage::new(i64::MIN, 0),
            TimestampMessage::new(1, 0),
        );
        assert_eq!(offset.seconds, i64::MIN);
    }
}

#[cfg(test)]
pub use tests::MockClock;

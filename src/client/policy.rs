//! Clock adjustment policy.
//!
//! | offset                                  | action                       |
//! |-----------------------------------------|------------------------------|
//! | `1 <= abs(seconds) <= max_step_secs`    | step to the corrected remote |
//! | `abs(seconds) > max_step_secs`          | reject, log, do nothing      |
//! | `seconds == 0`, `abs(micros) >= min_slew` | slew by the offset         |
//! | otherwise                               | nothing                      |

use crate::client::constants::{MAX_STEP_SECS, MIN_SLEW_MICROS};
use crate::clock::{Clock, ClockError, Offset};
use crate::protocol::TimestampMessage;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Half of the measured connect-to-receive interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayEstimate {
    pub round_trip_half: Duration,
}

impl DelayEstimate {
    /// Estimate from the samples taken before connecting and after the
    /// message was complete. Returns `None` if the clock ran backwards
    /// between the two samples.
    pub fn from_samples(before_connect: TimestampMessage, after_recv: TimestampMessage) -> Option<Self> {
        let elapsed = after_recv.as_micros() - before_connect.as_micros();
        if elapsed < 0 {
            debug!(elapsed_us = elapsed as i64, "Clock went backwards during session");
            return None;
        }
        let half = u64::try_from(elapsed / 2).unwrap_or(u64::MAX);
        Some(Self {
            round_trip_half: Duration::from_micros(half),
        })
    }
}

/// What the policy decided to do with one measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Step { target: TimestampMessage, offset: Offset },
    Slew { offset: Offset },
    Reject { offset: Offset },
    NoAction { offset: Offset },
}

impl Adjustment {
    pub fn offset(&self) -> Offset {
        match *self {
            Adjustment::Step { offset, .. }
            | Adjustment::Slew { offset }
            | Adjustment::Reject { offset }
            | Adjustment::NoAction { offset } => offset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustmentPolicy {
    pub max_step_secs: u64,
    pub min_slew_micros: u64,
    /// Log successful adjustments at info level
    pub announce: bool,
}

impl Default for AdjustmentPolicy {
    fn default() -> Self {
        Self {
            max_step_secs: MAX_STEP_SECS,
            min_slew_micros: MIN_SLEW_MICROS,
            announce: true,
        }
    }
}

impl AdjustmentPolicy {
    /// Remote time moved forward by the one-way delay estimate, if any.
    pub fn corrected(remote: TimestampMessage, delay: Option<DelayEstimate>) -> TimestampMessage {
        match delay {
            Some(delay) => remote.shifted_by_micros(delay.round_trip_half.as_micros() as i128),
            None => remote,
        }
    }

    /// Pure decision for `remote` observed against `local`.
    pub fn decide(
        &self,
        remote: TimestampMessage,
        delay: Option<DelayEstimate>,
        local: TimestampMessage,
    ) -> Adjustment {
        let target = Self::corrected(remote, delay);
        let offset = Offset::between(target, local);
        let whole_seconds = offset.seconds.unsigned_abs();

        if whole_seconds >= 1 {
            if whole_seconds <= self.max_step_secs {
                Adjustment::Step { target, offset }
            } else {
                Adjustment::Reject { offset }
            }
        } else if offset.microseconds.unsigned_abs() >= self.min_slew_micros {
            Adjustment::Slew { offset }
        } else {
            Adjustment::NoAction { offset }
        }
    }

    /// Samples the local clock, decides, and carries out the decision.
    ///
    /// Errors are reported here and returned; they never touch the
    /// connection the measurement came from.
    pub fn apply<C: Clock>(
        &self,
        clock: &C,
        remote: TimestampMessage,
        delay: Option<DelayEstimate>,
    ) -> Result<Adjustment, ClockError> {
        let local = clock.current_local_time().map_err(|e| {
            error!(error = %e, "Unable to sample local clock");
            e
        })?;
        let adjustment = self.decide(remote, delay, local);
        let offset = adjustment.offset();

        match adjustment {
            Adjustment::Step { target, .. } => {
                clock.set_local_time(target).map_err(|e| {
                    error!(error = %e, target_time = %target, "Failed to step clock");
                    e
                })?;
                if self.announce {
                    info!(
                        target_time = %target,
                        offset_s = offset.seconds,
                        "Adjusted system time (step)"
                    );
                }
            }
            Adjustment::Slew { .. } => {
                clock.slew_local_time(offset).map_err(|e| {
                    error!(error = %e, offset_us = offset.as_micros() as i64, "Failed to slew clock");
                    e
                })?;
                if self.announce {
                    info!(offset_us = offset.as_micros() as i64, "Adjusted system time (slew)");
                }
            }
            Adjustment::Reject { .. } => {
                warn!(
                    offset_s = offset.seconds,
                    max_step_s = self.max_step_secs,
                    remote_time = %remote,
                    "Time beyond acceptable limits"
                );
            }
            Adjustment::NoAction { .. } => {
                debug!(offset_us = offset.microseconds, "Offset within tolerance");
            }
        }
        Ok(adjustment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use std::io;

    const LOCAL: TimestampMessage = TimestampMessage {
        seconds: 1_700_000_000,
        microseconds: 400_000,
    };

    fn remote_at(offset: Offset) -> TimestampMessage {
        TimestampMessage::new(
            LOCAL.seconds + offset.seconds,
            LOCAL.microseconds + offset.microseconds,
        )
    }

    fn clock_at_local() -> MockClock {
        let mut clock = MockClock::new();
        clock
            .expect_current_local_time()
            .returning(|| Ok(LOCAL));
        clock
    }

    #[test]
    fn test_ten_seconds_steps_clock() {
        let remote = remote_at(Offset::new(10, 0));
        let mut clock = clock_at_local();
        clock
            .expect_set_local_time()
            .withf(move |t| *t == remote)
            .times(1)
            .returning(|_| Ok(()));
        clock.expect_slew_local_time().times(0);

        let adjustment = AdjustmentPolicy::default().apply(&clock, remote, None).unwrap();
        assert!(matches!(adjustment, Adjustment::Step { .. }));
    }

    #[test]
    fn test_negative_offset_steps_clock() {
        let remote = remote_at(Offset::new(-15, 0));
        let mut clock = clock_at_local();
        clock.expect_set_local_time().times(1).returning(|_| Ok(()));
        clock.expect_slew_local_time().times(0);

        AdjustmentPolicy::default().apply(&clock, remote, None).unwrap();
    }

    #[test]
    fn test_twenty_seconds_rejected() {
        let remote = remote_at(Offset::new(20, 0));
        let mut clock = clock_at_local();
        clock.expect_set_local_time().times(0);
        clock.expect_slew_local_time().times(0);

        let adjustment = AdjustmentPolicy::default().apply(&clock, remote, None).unwrap();
        assert_eq!(
            adjustment,
            Adjustment::Reject {
                offset: Offset::new(20, 0)
            }
        );
    }

    #[test]
    fn test_sub_second_offset_slews() {
        let remote = remote_at(Offset::new(0, 100));
        let mut clock = clock_at_local();
        clock.expect_set_local_time().times(0);
        clock
            .expect_slew_local_time()
            .withf(|offset| *offset == Offset::new(0, 100))
            .times(1)
            .returning(|_| Ok(()));

        AdjustmentPolicy::default().apply(&clock, remote, None).unwrap();
    }

    #[test]
    fn test_tiny_offset_left_alone() {
        let remote = remote_at(Offset::new(0, 2));
        let mut clock = clock_at_local();
        clock.expect_set_local_time().times(0);
        clock.expect_slew_local_time().times(0);

        let adjustment = AdjustmentPolicy::default().apply(&clock, remote, None).unwrap();
        assert!(matches!(adjustment, Adjustment::NoAction { .. }));
    }

    #[test]
    fn test_delay_shifts_target() {
        let remote = remote_at(Offset::new(3, 0));
        let delay = DelayEstimate {
            round_trip_half: Duration::from_micros(1_500),
        };
        let decided = AdjustmentPolicy::default().decide(remote, Some(delay), LOCAL);
        assert_eq!(
            decided,
            Adjustment::Step {
                target: TimestampMessage::new(LOCAL.seconds + 3, LOCAL.microseconds + 1_500),
                offset: Offset::new(3, 1_500),
            }
        );
    }

    #[test]
    fn test_delay_can_push_into_slew() {
        let remote = remote_at(Offset::new(0, 2));
        let delay = DelayEstimate {
            round_trip_half: Duration::from_micros(10),
        };
        let decided = AdjustmentPolicy::default().decide(remote, Some(delay), LOCAL);
        assert_eq!(
            decided,
            Adjustment::Slew {
                offset: Offset::new(0, 12)
            }
        );
    }

    #[test]
    fn test_step_failure_reported() {
        let remote = remote_at(Offset::new(5, 0));
        let mut clock = clock_at_local();
        clock.expect_set_local_time().times(1).returning(|_| {
            Err(ClockError::Set(io::Error::from(
                io::ErrorKind::PermissionDenied,
            )))
        });

        let result = AdjustmentPolicy::default().apply(&clock, remote, None);
        assert!(matches!(result, Err(ClockError::Set(_))));
    }

    #[test]
    fn test_unreadable_clock_takes_no_action() {
        let mut clock = MockClock::new();
        clock
            .expect_current_local_time()
            .returning(|| Err(ClockError::Read(io::Error::from(io::ErrorKind::Other))));
        clock.expect_set_local_time().times(0);
        clock.expect_slew_local_time().times(0);

        let result = AdjustmentPolicy::default().apply(&clock, LOCAL, None);
        assert!(matches!(result, Err(ClockError::Read(_))));
    }

    #[test]
    fn test_delay_estimate_halves_round_trip() {
        let before = TimestampMessage::new(100, 999_000);
        let after = TimestampMessage::new(101, 1_000);
        let delay = DelayEstimate::from_samples(before, after).unwrap();
        assert_eq!(delay.round_trip_half, Duration::from_micros(1_000));
    }

    #[test]
    fn test_delay_estimate_absent_when_clock_ran_backwards() {
        let before = TimestampMessage::new(101, 0);
        let after = TimestampMessage::new(100, 0);
        assert!(DelayEstimate::from_samples(before, after).is_none());
    }
}

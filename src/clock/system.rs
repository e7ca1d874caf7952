use crate::clock::{Clock, ClockError, Offset};
use crate::protocol::TimestampMessage;
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// The host's real-time clock.
///
/// Stepping and slewing need root or `CAP_SYS_TIME`; failures come back as
/// [`ClockError`] with the OS error attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn current_local_time(&self) -> Result<TimestampMessage, ClockError> {
        let micros = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => since.as_micros() as i128,
            Err(before) => -(before.duration().as_micros() as i128),
        };
        Ok(TimestampMessage::from_micros(micros))
    }

    fn set_local_time(&self, time: TimestampMessage) -> Result<(), ClockError> {
        debug!(target_time = %time, "Stepping system clock");
        step_clock(time)
    }

    fn slew_local_time(&self, offset: Offset) -> Result<(), ClockError> {
        debug!(offset_us = offset.as_micros() as i64, "Slewing system clock");
        slew_clock(offset.as_micros())
    }
}

/// Reads the real clock but only reports the adjustments it is asked for.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObserveOnlyClock<C = SystemClock> {
    inner: C,
}

impl<C: Clock> ObserveOnlyClock<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: Clock> Clock for ObserveOnlyClock<C> {
    fn current_local_time(&self) -> Result<TimestampMessage, ClockError> {
        self.inner.current_local_time()
    }

    fn set_local_time(&self, time: TimestampMessage) -> Result<(), ClockError> {
        info!(target_time = %time, "Dry run: would step system clock");
        Ok(())
    }

    fn slew_local_time(&self, offset: Offset) -> Result<(), ClockError> {
        info!(
            offset_us = offset.as_micros() as i64,
            "Dry run: would slew system clock"
        );
        Ok(())
    }
}

fn invalid(what: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, what)
}

#[cfg(unix)]
fn step_clock(time: TimestampMessage) -> Result<(), ClockError> {
    let normalized = TimestampMessage::from_micros(time.as_micros());
    let ts = libc::timespec {
        tv_sec: libc::time_t::try_from(normalized.seconds)
            .map_err(|_| ClockError::Set(invalid("seconds out of range for time_t")))?,
        tv_nsec: (normalized.microseconds * 1_000) as libc::c_long,
    };
    // SAFETY: `ts` is a valid, initialized timespec for the duration of the call.
    let rc = unsafe { libc::clock_settime(libc::CLOCK_REALTIME, &ts) };
    if rc != 0 {
        return Err(ClockError::Set(io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn step_clock(_time: TimestampMessage) -> Result<(), ClockError> {
    Err(ClockError::Unsupported("clock stepping requires a Unix host"))
}

#[cfg(target_os = "linux")]
fn slew_clock(delta_micros: i128) -> Result<(), ClockError> {
    let offset = libc::c_long::try_from(delta_micros)
        .map_err(|_| ClockError::Slew(invalid("slew offset out of range")))?;
    // SAFETY: timex is a plain C struct for which all-zero is a valid value.
    let mut tx: libc::timex = unsafe { std::mem::zeroed() };
    tx.modes = libc::ADJ_OFFSET_SINGLESHOT;
    tx.offset = offset;
    // SAFETY: `tx` is a valid, exclusively borrowed timex.
    let rc = unsafe { libc::adjtimex(&mut tx) };
    if rc == -1 {
        return Err(ClockError::Slew(io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(all(unix, not(target_os = "linux")))]
fn slew_clock(delta_micros: i128) -> Result<(), ClockError> {
    let delta = TimestampMessage::from_micros(delta_micros);
    let tv = libc::timeval {
        tv_sec: libc::time_t::try_from(delta.seconds)
            .map_err(|_| ClockError::Slew(invalid("slew offset out of range")))?,
        tv_usec: delta.microseconds as libc::suseconds_t,
    };
    // SAFETY: `tv` is valid for the call and the old-delta pointer may be null.
    let rc = unsafe { libc::adjtime(&tv, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(ClockError::Slew(io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn slew_clock(_delta_micros: i128) -> Result<(), ClockError> {
    Err(ClockError::Unsupported("clock slewing requires a Unix host"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_reads_recent_time() {
        let now = SystemClock::new().current_local_time().unwrap();
        // 2020-01-01T00:00:00Z
        assert!(now.seconds > 1_577_836_800);
        assert!((0..1_000_000).contains(&now.microseconds));
    }

    #[test]
    fn test_observe_only_never_fails_adjustments() {
        let clock = ObserveOnlyClock::new(SystemClock::new());
        assert!(clock
            .set_local_time(TimestampMessage::new(1_700_000_000, 0))
            .is_ok());
        assert!(clock.slew_local_time(Offset::new(0, 250)).is_ok());
    }
}

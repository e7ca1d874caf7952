//! One synchronization attempt.
//!
//! `Idle -> Connecting -> Framing -> Decoding -> Deciding -> Closed`; any
//! failure aborts the attempt and drops the connection. A session holds at
//! most one connection, owned on its stack, so every exit path closes it.

use crate::client::connector::Connector;
use crate::client::error::SessionError;
use crate::client::policy::{Adjustment, AdjustmentPolicy, DelayEstimate};
use crate::clock::{Clock, ClockError};
use crate::protocol::{Framer, TimestampMessage};
use crate::shutdown::ShutdownToken;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Framing,
    Decoding,
    Deciding,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Framing => "framing",
            SessionState::Decoding => "decoding",
            SessionState::Deciding => "deciding",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Result of a session that received and decoded a timestamp
#[derive(Debug)]
pub struct SessionOutcome {
    pub remote: TimestampMessage,
    pub delay: Option<DelayEstimate>,
    /// Clock failures are carried here rather than aborting the session
    pub adjustment: Result<Adjustment, ClockError>,
}

pub struct ClientSession<N, C> {
    connector: N,
    clock: C,
    framer: Framer,
    policy: AdjustmentPolicy,
    connect_timeout: Duration,
}

impl<N: Connector, C: Clock> ClientSession<N, C> {
    pub fn new(
        connector: N,
        clock: C,
        framer: Framer,
        policy: AdjustmentPolicy,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            clock,
            framer,
            policy,
            connect_timeout,
        }
    }

    pub fn target(&self) -> String {
        self.connector.target()
    }

    /// Runs one attempt to completion or to the first error.
    pub fn run_once(&self, shutdown: &ShutdownToken) -> Result<SessionOutcome, SessionError> {
        let mut state = SessionState::Idle;

        transition(&mut state, SessionState::Connecting);
        let before_connect = self.sample("before connect");
        let mut stream = self.connector.connect(self.connect_timeout)?;

        // Shutdown may have been requested while blocked in connect.
        if shutdown.is_requested() {
            debug!("Shutdown requested after connect");
            return Err(SessionError::Cancelled);
        }

        transition(&mut state, SessionState::Framing);
        let frame = self.framer.read_message(&mut stream, shutdown).map_err(|e| {
            if shutdown.is_requested() {
                SessionError::Cancelled
            } else {
                SessionError::Framing(e)
            }
        })?;
        let after_recv = self.sample("after receive");

        transition(&mut state, SessionState::Decoding);
        let remote = TimestampMessage::decode_frame(&frame).map_err(|e| {
            let text = String::from_utf8_lossy(&frame);
            warn!(error = %e, frame = text.trim_end(), "Incorrect time");
            e
        })?;

        transition(&mut state, SessionState::Deciding);
        let delay = match (before_connect, after_recv) {
            (Some(before), Some(after)) => DelayEstimate::from_samples(before, after),
            _ => None,
        };
        let adjustment = self.policy.apply(&self.clock, remote, delay);

        drop(stream);
        transition(&mut state, SessionState::Closed);

        Ok(SessionOutcome {
            remote,
            delay,
            adjustment,
        })
    }

    fn sample(&self, label: &'static str) -> Option<TimestampMessage> {
        match self.clock.current_local_time() {
            Ok(ts) => Some(ts),
            Err(e) => {
                warn!(error = %e, sample = label, "Clock sample failed; delay correction disabled");
                None
            }
        }
    }
}

fn transition(state: &mut SessionState, next: SessionState) {
    debug!(from = %state, to = %next, "Session state");
    *state = next;
}

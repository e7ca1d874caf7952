use crate::client::connector::Connector;
use crate::client::constants::*;
use crate::client::error::{ConnectError, SessionError};
use crate::client::session::{ClientSession, SessionOutcome};
use crate::clock::Clock;
use crate::shutdown::ShutdownToken;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Delays applied between sessions, chosen by how the last one ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub sync_interval: Duration,
    pub connect_retry: Duration,
    pub socket_retry: Duration,
    pub protocol_retry: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(SYNC_INTERVAL_SECS),
            connect_retry: Duration::from_secs(CONNECT_RETRY_SECS),
            socket_retry: Duration::from_secs(SOCKET_RETRY_SECS),
            protocol_retry: Duration::from_secs(PROTOCOL_RETRY_SECS),
        }
    }
}

impl Backoff {
    pub fn delay_after(&self, result: &Result<SessionOutcome, SessionError>) -> Duration {
        match result {
            Ok(_) | Err(SessionError::Cancelled) => self.sync_interval,
            Err(SessionError::Connect(e)) if e.is_local() => self.socket_retry,
            Err(SessionError::Connect(_)) => self.connect_retry,
            Err(SessionError::Framing(_)) | Err(SessionError::Decode(_)) => self.protocol_retry,
        }
    }
}

/// Counters returned when the driver loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverSummary {
    pub sessions: u64,
    pub successes: u64,
    pub connect_failures: u64,
    pub protocol_failures: u64,
}

/// Runs client sessions back to back until shutdown is requested.
pub struct ClientDriver<N, C> {
    session: ClientSession<N, C>,
    backoff: Backoff,
    log_connect_errors: bool,
}

impl<N: Connector, C: Clock> ClientDriver<N, C> {
    pub fn new(session: ClientSession<N, C>, backoff: Backoff) -> Self {
        Self {
            session,
            backoff,
            log_connect_errors: true,
        }
    }

    /// Report connect failures at debug level only.
    pub fn quiet_connect_errors(mut self, quiet: bool) -> Self {
        self.log_connect_errors = !quiet;
        self
    }

    pub fn run(&self, shutdown: &ShutdownToken) -> DriverSummary {
        let mut summary = DriverSummary::default();
        info!(target = %self.session.target(), "Client driver started");

        while !shutdown.is_requested() {
            let result = self.session.run_once(shutdown);
            summary.sessions += 1;
            self.report(&result, &mut summary);

            if matches!(result, Err(SessionError::Cancelled)) {
                break;
            }

            let delay = self.backoff.delay_after(&result);
            debug!(delay_ms = delay.as_millis() as u64, "Waiting before next session");
            if shutdown.sleep(delay) {
                break;
            }
        }

        info!(
            sessions = summary.sessions,
            successes = summary.successes,
            connect_failures = summary.connect_failures,
            protocol_failures = summary.protocol_failures,
            "Client driver stopped"
        );
        summary
    }

    fn report(&self, result: &Result<SessionOutcome, SessionError>, summary: &mut DriverSummary) {
        match result {
            Ok(outcome) => {
                summary.successes += 1;
                debug!(
                    remote_time = %outcome.remote,
                    delay_us = outcome.delay.map(|d| d.round_trip_half.as_micros() as u64),
                    "Session completed"
                );
            }
            Err(SessionError::Connect(e)) => {
                summary.connect_failures += 1;
                self.report_connect(e);
            }
            Err(e @ (SessionError::Framing(_) | SessionError::Decode(_))) => {
                summary.protocol_failures += 1;
                warn!(error = %e, retry_ms = self.backoff.protocol_retry.as_millis() as u64, "Session aborted");
            }
            Err(SessionError::Cancelled) => info!("Session cancelled by shutdown"),
        }
    }

    fn report_connect(&self, e: &ConnectError) {
        let retry = if e.is_local() {
            self.backoff.socket_retry
        } else {
            self.backoff.connect_retry
        };
        if self.log_connect_errors || e.is_local() {
            error!(error = %e, retry_ms = retry.as_millis() as u64, "Connect failed");
        } else {
            debug!(error = %e, retry_ms = retry.as_millis() as u64, "Connect failed");
        }
    }
}

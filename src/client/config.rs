use crate::client::constants::*;
use crate::client::driver::Backoff;
use crate::client::error::{ClientError, Result};
use crate::client::policy::AdjustmentPolicy;
use crate::protocol::{FramerLimits, MAX_MESSAGE_SIZE};
use clap::Parser;
use std::time::Duration;
use tracing::debug;

#[derive(Parser, Debug, Clone)]
#[command(name = "timepeer-client")]
#[command(about = "Periodically synchronizes the local clock with a timepeer server")]
pub struct Config {
    /// Time server host name or IP address
    #[arg(long)]
    pub host: String,

    /// Time server port
    #[arg(long)]
    pub port: u16,

    /// Connect deadline in seconds
    #[arg(long, default_value_t = CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,

    /// Per-read deadline in seconds
    #[arg(long, default_value_t = READ_TIMEOUT_SECS)]
    pub read_timeout_secs: u64,

    /// Overall deadline for receiving one message, in seconds
    #[arg(long, default_value_t = MESSAGE_TIMEOUT_SECS)]
    pub message_timeout_secs: u64,

    /// Largest accepted message in bytes, terminator included
    #[arg(long, default_value_t = MAX_MESSAGE_SIZE)]
    pub max_message_bytes: usize,

    /// Seconds between successful synchronizations
    #[arg(long, default_value_t = SYNC_INTERVAL_SECS)]
    pub interval_secs: u64,

    /// Seconds to wait after the server could not be reached
    #[arg(long, default_value_t = CONNECT_RETRY_SECS)]
    pub connect_retry_secs: u64,

    /// Seconds to wait when no local socket could be created
    #[arg(long, default_value_t = SOCKET_RETRY_SECS)]
    pub socket_retry_secs: u64,

    /// Seconds to wait after a malformed or incomplete message
    #[arg(long, default_value_t = PROTOCOL_RETRY_SECS)]
    pub protocol_retry_secs: u64,

    /// Largest offset in seconds that is corrected by stepping the clock
    #[arg(long, default_value_t = MAX_STEP_SECS)]
    pub max_step_secs: u64,

    /// Smallest sub-second offset in microseconds that is slewed
    #[arg(long, default_value_t = MIN_SLEW_MICROS)]
    pub min_slew_micros: u64,

    /// Run a single session and exit
    #[arg(long)]
    pub once: bool,

    /// Report adjustments without changing the system clock
    #[arg(long)]
    pub dry_run: bool,

    /// Do not log successful clock adjustments
    #[arg(long)]
    pub quiet_adjustments: bool,

    /// Log connect failures at debug level only
    #[arg(long)]
    pub quiet_connect_errors: bool,

    /// Disable all logging
    #[arg(long)]
    pub disable_all_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,
}

impl Config {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn framer_limits(&self) -> FramerLimits {
        FramerLimits {
            max_bytes: self.max_message_bytes,
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            message_timeout: Duration::from_secs(self.message_timeout_secs),
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            sync_interval: Duration::from_secs(self.interval_secs),
            connect_retry: Duration::from_secs(self.connect_retry_secs),
            socket_retry: Duration::from_secs(self.socket_retry_secs),
            protocol_retry: Duration::from_secs(self.protocol_retry_secs),
        }
    }

    pub fn policy(&self) -> AdjustmentPolicy {
        AdjustmentPolicy {
            max_step_secs: self.max_step_secs,
            min_slew_micros: self.min_slew_micros,
            announce: !self.quiet_adjustments,
        }
    }

    /// Returns true if JSON format logging is enabled
    pub fn is_json_format(&self) -> bool {
        self.log_format.to_lowercase() == "json"
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");
        if self.host.trim().is_empty() {
            return Err(ClientError::Config("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(ClientError::Config("port must be > 0".into()));
        }
        if self.connect_timeout_secs == 0 || self.read_timeout_secs == 0 {
            return Err(ClientError::Config("timeouts must be > 0".into()));
        }
        let durations = [
            ("connect timeout", self.connect_timeout_secs),
            ("read timeout", self.read_timeout_secs),
            ("message timeout", self.message_timeout_secs),
            ("interval", self.interval_secs),
            ("connect retry", self.connect_retry_secs),
            ("socket retry", self.socket_retry_secs),
            ("protocol retry", self.protocol_retry_secs),
        ];
        if let Some((name, _)) = durations
            .iter()
            .find(|(_, secs)| *secs > MAX_DURATION_SECS)
        {
            return Err(ClientError::Config(format!(
                "{} must be at most {} seconds",
                name, MAX_DURATION_SECS
            )));
        }
        if self.message_timeout_secs < self.read_timeout_secs {
            return Err(ClientError::Config(
                "message timeout must be >= read timeout".into(),
            ));
        }
        // Shortest useful line is "0,0\r\n".
        if !(5..=MAX_MESSAGE_SIZE).contains(&self.max_message_bytes) {
            return Err(ClientError::Config(format!(
                "max message bytes must be between 5 and {}",
                MAX_MESSAGE_SIZE
            )));
        }
        crate::logging::validate_level(&self.log_level).map_err(ClientError::Config)?;
        debug!("Configuration validated successfully");
        Ok(())
    }
}

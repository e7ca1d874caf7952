//! Server configuration module
//!
//! Provides CLI argument parsing and validation for the time server.

use crate::server::handler::HandlerOptions;
use clap::Parser;
use std::time::Duration;
use tracing::debug;

/// Default TCP port for the time service
pub const DEFAULT_PORT: u16 = 3737;

#[derive(Parser, Debug, Clone)]
#[command(name = "timepeer-server")]
#[command(about = "Answers every TCP connection with the current wall-clock time")]
pub struct ServerConfig {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Bind port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// SO_LINGER seconds applied before closing each connection (0 = abortive close)
    #[arg(long)]
    pub so_linger: Option<u64>,

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

impl ServerConfig {
    /// Returns the full bind address as a string (bind:port)
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn handler_options(&self) -> HandlerOptions {
        HandlerOptions {
            linger: self.so_linger.map(Duration::from_secs),
        }
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<(), String> {
        debug!("Validating server configuration");

        if self.port == 0 {
            return Err("port must be > 0".into());
        }

        if let Some(linger) = self.so_linger {
            if linger > i32::MAX as u64 {
                return Err("so_linger out of range".into());
            }
        }

        crate::logging::validate_level(&self.log_level)?;

        debug!("Server configuration validated successfully");
        Ok(())
    }

    /// Returns true if JSON format logging is enabled
    pub fn is_json_format(&self) -> bool {
        self.log_format.to_lowercase() == "json"
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use timepeer::clock::SystemClock;
use timepeer::logging::{disable_logging, init_logging_with_config};
use timepeer::server::{ServerConfig, TimeServer};
use timepeer::shutdown::{install_signal_handlers, ShutdownToken};
use tracing::{error, info};

fn main() {
    // Parse CLI arguments
    let config = ServerConfig::parse();

    if config.disable_all_logs {
        disable_logging();
    } else {
        init_logging_with_config(&config.log_level, config.is_json_format());
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config) {
        error!(error = %e, "Server failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(config: ServerConfig) -> Result<()> {
    let addr = config.address();

    // Bind and listen once; there is no retry for this
    let server = TimeServer::bind(&addr, SystemClock::new(), config.handler_options())
        .with_context(|| format!("Unable to start time server on {}", addr))?;

    let shutdown = ShutdownToken::new();
    install_signal_handlers(&shutdown).context("Failed to install signal handlers")?;

    info!("Ready to accept connections...");
    server.run(&shutdown);

    Ok(())
}

use anyhow::{Context, Result};
use clap::Parser;
use timepeer::client::{ClientDriver, ClientSession, Config, TcpConnector};
use timepeer::clock::{Clock, ObserveOnlyClock, SystemClock};
use timepeer::logging::{disable_logging, init_logging_with_config};
use timepeer::protocol::Framer;
use timepeer::shutdown::{install_signal_handlers, ShutdownToken};
use tracing::{error, info};

fn main() {
    let config = Config::parse();

    if config.disable_all_logs {
        disable_logging();
    } else {
        init_logging_with_config(&config.log_level, config.is_json_format());
    }

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let result = if config.dry_run {
        info!("Dry run: the system clock will not be modified");
        run(config, ObserveOnlyClock::new(SystemClock::new()))
    } else {
        run(config, SystemClock::new())
    };

    if let Err(e) = result {
        error!(error = %e, "Client failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run<C: Clock>(config: Config, clock: C) -> Result<()> {
    let session = ClientSession::new(
        TcpConnector::new(config.host.clone(), config.port),
        clock,
        Framer::new(config.framer_limits()),
        config.policy(),
        config.connect_timeout(),
    );

    let shutdown = ShutdownToken::new();
    install_signal_handlers(&shutdown).context("Failed to install signal handlers")?;

    if config.once {
        let outcome = session
            .run_once(&shutdown)
            .with_context(|| format!("Synchronization with {} failed", session.target()))?;
        info!(remote_time = %outcome.remote, "Single session completed");
        if let Err(e) = outcome.adjustment {
            return Err(e).context("Clock adjustment failed");
        }
        return Ok(());
    }

    ClientDriver::new(session, config.backoff())
        .quiet_connect_errors(config.quiet_connect_errors)
        .run(&shutdown);

    Ok(())
}

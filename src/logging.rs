use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Checks a `--log-level` value
pub fn validate_level(level: &str) -> Result<(), String> {
    if LEVELS.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(format!("log_level must be one of: {}", LEVELS.join(", ")))
    }
}

/// Initialize structured logging
///
/// `RUST_LOG` takes precedence over `level` when set, e.g.
/// `RUST_LOG=timepeer=debug`. `json` switches the formatter to one JSON
/// object per line.
pub fn init_logging_with_config(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_file(true),
            )
            .init();
    }
}

/// Installs a subscriber that drops every event.
pub fn disable_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::new("off"))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_level() {
        assert!(validate_level("debug").is_ok());
        assert!(validate_level("WARN").is_ok());
        assert!(validate_level("verbose").is_err());
    }
}

//! Logging initialization.
//!
//! Uses the `tracing` ecosystem. Logs go to stderr so stdout stays free for
//! command output (`gen-config`, batch reports). `RUST_LOG` overrides the
//! configured level.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Pick the filter directive: `--verbose` forces `debug`, otherwise the
/// configured level.
pub fn default_directive(config: &LoggingConfig, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else {
        config.level.clone()
    }
}

/// Install the global subscriber. Call once, at startup.
pub fn init(config: &LoggingConfig, verbose: bool, json_override: bool) {
    let directive = default_directive(config, verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if json_override || config.format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    }
}

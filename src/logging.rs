//! Logging setup
//!
//! Diagnostics go to stderr so stdout stays reserved for command output.

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber
///
/// `RUST_LOG` takes precedence, then `--debug`, then the configured level.
/// Calling this more than once is a no-op.
pub fn init_logging(config: &LoggingConfig, debug: bool) {
    let directive = filter_directive(
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
        &config.level,
        debug,
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let plain = (!config.json()).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));
    let json = config
        .json()
        .then(|| fmt::layer().json().with_current_span(true).with_writer(std::io::stderr));

    let _ = tracing_subscriber::registry()
        .with(plain)
        .with(json)
        .with(filter)
        .try_init();
}

fn filter_directive(env: Option<String>, level: &str, debug: bool) -> String {
    match env {
        Some(env) if !env.trim().is_empty() => env,
        _ if debug => "debug".to_string(),
        _ => level.to_string(),
    }
}

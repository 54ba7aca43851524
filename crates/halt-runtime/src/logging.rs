//! Logging setup.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.

use std::env;

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Default filter when neither `HALT_LOG_LEVEL` nor `RUST_LOG` is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Resolve the filter directive: `HALT_LOG_LEVEL`, then `RUST_LOG`, then default.
pub fn log_level() -> String {
    env::var("HALT_LOG_LEVEL")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
}

/// Install the global subscriber.
pub fn init(verbose: bool) -> Result<()> {
    let directive = if verbose { "debug".to_string() } else { log_level() };
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| anyhow!("invalid log filter {:?}: {}", directive, e))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}

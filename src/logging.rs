//! Tracing setup for the sidecar binary.
//!
//! Output goes to stderr so the sidecar container log carries it; `RUST_LOG`
//! overrides the configured level.

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Component name attached to the startup log line.
pub const COMPONENT: &str = "ssd-hook-sidecar";

/// Builds the log filter from `RUST_LOG`, falling back to `default_level`.
///
/// # Errors
///
/// Returns [`Error::Config`] if neither directive parses.
pub fn env_filter(default_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| Error::Config(format!("invalid log level '{default_level}': {e}")))
}

/// Installs the global tracing subscriber.
///
/// # Errors
///
/// Returns [`Error::Config`] if the filter is invalid or a subscriber is
/// already installed.
pub fn init(default_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level)?)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Config(format!("failed to set tracing subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_accepts_levels() {
        for level in ["trace", "debug", "info", "warn", "error", "ssd_hook=debug"] {
            assert!(env_filter(level).is_ok(), "level {level} should parse");
        }
    }
}

// src/logging.rs

//! Logging setup for `sentinel` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `SENTINEL_LOG` environment variable, either a bare level ("debug") or a
//!    full filter directive ("sentinel::exec=trace,info")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout carries only rendered test output.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "SENTINEL_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(lvl) => EnvFilter::new(directive_for(lvl)),
        None => filter_from_env(std::env::var(LOG_ENV_VAR).ok().as_deref()),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))?;

    Ok(())
}

fn directive_for(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

/// Build a filter from the env var value, falling back to `info` when it is
/// unset or unparsable.
fn filter_from_env(value: Option<&str>) -> EnvFilter {
    let Some(raw) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return EnvFilter::new("info");
    };

    let normalised = match raw.to_lowercase().as_str() {
        "warning" => "warn".to_string(),
        _ => raw.to_string(),
    };

    EnvFilter::try_new(&normalised).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_value_accepts_levels_and_directives() {
        assert_eq!(filter_from_env(None).to_string(), "info");
        assert_eq!(filter_from_env(Some("  ")).to_string(), "info");
        assert_eq!(filter_from_env(Some("warning")).to_string(), "warn");
        assert_eq!(
            filter_from_env(Some("sentinel::exec=trace")).to_string(),
            "sentinel::exec=trace"
        );
    }
}

// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::cli::CliArgs;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Like [`load_from_path`], but a missing file yields the defaults.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = %path.display(), "no config file found, using defaults");
        return Ok(RawConfigFile::default());
    }
    load_from_path(path)
}

/// Load (or default) a config file and run validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_or_default(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Load the config, apply command-line overrides, then validate the result.
///
/// Overrides are applied before validation so that e.g. `--timeout 0` is
/// rejected exactly like `timeout_secs = 0` in the file.
pub fn load_with_overrides(path: impl AsRef<Path>, args: &CliArgs) -> Result<ConfigFile> {
    let mut raw = load_or_default(&path)?;
    apply_cli_overrides(&mut raw, args);
    ConfigFile::try_from(raw)
}

pub fn apply_cli_overrides(raw: &mut RawConfigFile, args: &CliArgs) {
    if !args.paths.is_empty() {
        raw.watch.paths = args.paths.clone();
    }
    if let Some(mode) = args.mode {
        raw.watch.mode = mode;
    }
    if let Some(workers) = args.workers {
        raw.exec.workers = workers;
    }
    if let Some(timeout) = args.timeout {
        raw.exec.timeout_secs = timeout;
    }
    if let Some(pattern) = &args.test {
        raw.exec.run = Some(pattern.clone());
    }
    if args.verbose {
        raw.exec.verbose = true;
    }
    if args.no_cache {
        raw.cache.enabled = false;
        // An explicit `cached` strategy cannot survive `--no-cache`.
        if raw.exec.strategy == Some(crate::types::StrategyKind::Cached) {
            raw.exec.strategy = None;
        }
    }
}

/// Helper to resolve a default config path.
///
/// Returns `Sentinel.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Sentinel.toml")
}

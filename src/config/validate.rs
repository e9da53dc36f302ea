// src/config/validate.rs

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SentinelError};
use crate::exec::process::TARGET_PLACEHOLDER;
use crate::types::StrategyKind;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SentinelError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.watch, raw.exec, raw.cache))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_watch(cfg)?;
    validate_exec(cfg)?;
    validate_cache(cfg)?;
    Ok(())
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.debounce_ms == 0 {
        return Err(SentinelError::ConfigError(
            "[watch].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.watch.paths.is_empty() {
        return Err(SentinelError::ConfigError(
            "[watch].paths must name at least one directory".to_string(),
        ));
    }

    for pattern in cfg.watch.include.iter().chain(cfg.watch.exclude.iter()) {
        Glob::new(pattern).map_err(|e| {
            SentinelError::ConfigError(format!("invalid glob pattern '{pattern}' in [watch]: {e}"))
        })?;
    }

    if cfg.watch.related_depth == Some(0) {
        return Err(SentinelError::ConfigError(
            "[watch].related_depth must be >= 1 (omit it to follow every import)".to_string(),
        ));
    }

    Ok(())
}

fn validate_exec(cfg: &RawConfigFile) -> Result<()> {
    if cfg.exec.timeout_secs == 0 {
        return Err(SentinelError::ConfigError(
            "[exec].timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }

    if !cfg.exec.command.contains(TARGET_PLACEHOLDER) {
        return Err(SentinelError::ConfigError(format!(
            "[exec].command must contain the {TARGET_PLACEHOLDER} placeholder (got '{}')",
            cfg.exec.command
        )));
    }

    Ok(())
}

fn validate_cache(cfg: &RawConfigFile) -> Result<()> {
    if cfg.exec.strategy == Some(StrategyKind::Cached) && !cfg.cache.enabled {
        return Err(SentinelError::ConfigError(
            "[exec].strategy = \"cached\" requires [cache].enabled = true".to_string(),
        ));
    }
    Ok(())
}

// src/config/mod.rs

//! `Sentinel.toml` loading, CLI overrides and validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_with_overrides};
pub use model::{CacheSection, ConfigFile, ExecSection, RawConfigFile, WatchSection};

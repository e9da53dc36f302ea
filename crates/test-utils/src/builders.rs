use std::path::PathBuf;

use sentinel::config::{ConfigFile, RawConfigFile};
use sentinel::types::{CacheStorageMode, StrategyKind, WatchMode};

/// Builder for `ConfigFile` to simplify test setup.
#[derive(Debug, Clone, Default)]
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: WatchMode) -> Self {
        self.config.watch.mode = mode;
        self
    }

    pub fn watch_path(mut self, path: &str) -> Self {
        self.config.watch.paths = vec![PathBuf::from(path)];
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.watch.debounce_ms = ms;
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.watch.exclude.push(pattern.to_string());
        self
    }

    pub fn related_depth(mut self, depth: usize) -> Self {
        self.config.watch.related_depth = Some(depth);
        self
    }

    pub fn strategy(mut self, kind: StrategyKind) -> Self {
        self.config.exec.strategy = Some(kind);
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.exec.workers = n;
        self
    }

    pub fn command(mut self, template: &str) -> Self {
        self.config.exec.command = template.to_string();
        self
    }

    pub fn run_pattern(mut self, pattern: &str) -> Self {
        self.config.exec.run = Some(pattern.to_string());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.exec.timeout_secs = secs;
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache.enabled = enabled;
        self
    }

    pub fn cache_storage(mut self, storage: CacheStorageMode) -> Self {
        self.config.cache.storage = storage;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("builder produced an invalid config")
    }
}

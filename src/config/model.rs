// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{CacheStorageMode, StrategyKind, WatchMode};

/// Top-level configuration as read from `Sentinel.toml`.
///
/// ```toml
/// [watch]
/// mode = "related"
/// debounce_ms = 100
/// related_depth = 2
///
/// [exec]
/// strategy = "cached"
/// workers = 4
/// command = "go test -json {target}"
/// run = "TestCheckout"
///
/// [cache]
/// enabled = true
/// storage = "file"
/// ```
///
/// Every section is optional; an empty (or missing) file is a valid config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub exec: ExecSection,

    #[serde(default)]
    pub cache: CacheSection,
}

/// A `RawConfigFile` that passed validation.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub watch: WatchSection,
    pub exec: ExecSection,
    pub cache: CacheSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(watch: WatchSection, exec: ExecSection, cache: CacheSection) -> Self {
        Self { watch, exec, cache }
    }

    /// Strategy to build the engine with.
    ///
    /// An explicit `[exec].strategy` wins; otherwise `cached` when the cache
    /// is enabled and `parallel` when it is not.
    pub fn effective_strategy(&self) -> StrategyKind {
        match self.exec.strategy {
            Some(kind) => kind,
            None if self.cache.enabled => StrategyKind::Cached,
            None => StrategyKind::Parallel,
        }
    }

    /// Worker pool size with `0` resolved to the machine's parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.exec.workers > 0 {
            return self.exec.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.watch.debounce_ms)
    }

    pub fn target_timeout(&self) -> Duration {
        Duration::from_secs(self.exec.timeout_secs)
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    #[serde(default)]
    pub mode: WatchMode,

    /// Roots to watch, relative to the project root.
    #[serde(default = "default_watch_paths")]
    pub paths: Vec<PathBuf>,

    /// Quiet period before a batch of changes is released.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Globs a changed path must match to be reported.
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Extra globs appended to the built-in excludes.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// How many import hops `related` mode follows; `None` follows all.
    #[serde(default)]
    pub related_depth: Option<usize>,

    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            mode: WatchMode::default(),
            paths: default_watch_paths(),
            debounce_ms: default_debounce_ms(),
            include: default_include(),
            exclude: Vec::new(),
            related_depth: None,
            run_on_start: true,
        }
    }
}

/// `[exec]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecSection {
    /// If `None`, derived from `[cache].enabled`.
    #[serde(default)]
    pub strategy: Option<StrategyKind>,

    /// `0` means "use available parallelism".
    #[serde(default)]
    pub workers: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Shell command template; `{target}` is replaced by `./<package dir>`.
    #[serde(default = "default_command")]
    pub command: String,

    /// Only run tests matching this regex; appended as `-run '<pattern>'`.
    #[serde(default)]
    pub run: Option<String>,

    /// Source lines shown on each side of a failing line.
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,

    #[serde(default)]
    pub verbose: bool,
}

impl Default for ExecSection {
    fn default() -> Self {
        Self {
            strategy: None,
            workers: 0,
            timeout_secs: default_timeout_secs(),
            command: default_command(),
            run: None,
            context_lines: default_context_lines(),
            verbose: false,
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub storage: CacheStorageMode,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            storage: CacheStorageMode::default(),
        }
    }
}

fn default_watch_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_include() -> Vec<String> {
    vec![
        "**/*.go".to_string(),
        "**/go.mod".to_string(),
        "**/go.sum".to_string(),
    ]
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_command() -> String {
    "go test -json {target}".to_string()
}

fn default_context_lines() -> usize {
    2
}

fn default_true() -> bool {
    true
}

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which targets a settled change batch resolves to.
///
/// - `All`: every known test target.
/// - `Changed`: only targets whose own package files appear in the batch.
/// - `Related`: changed targets plus packages that (transitively) import them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    All,
    Changed,
    #[default]
    Related,
}

impl FromStr for WatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(WatchMode::All),
            "changed" => Ok(WatchMode::Changed),
            "related" => Ok(WatchMode::Related),
            other => Err(format!(
                "invalid watch mode: {other} (expected \"all\", \"changed\" or \"related\")"
            )),
        }
    }
}

impl fmt::Display for WatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatchMode::All => "all",
            WatchMode::Changed => "changed",
            WatchMode::Related => "related",
        };
        f.write_str(s)
    }
}

/// How a run request is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// One target at a time, in request order.
    Sequential,
    /// Bounded worker pool.
    Parallel,
    /// Replay cached suites, run the rest on the worker pool.
    Cached,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(StrategyKind::Sequential),
            "parallel" => Ok(StrategyKind::Parallel),
            "cached" => Ok(StrategyKind::Cached),
            other => Err(format!(
                "invalid execution strategy: {other} (expected \"sequential\", \"parallel\" or \"cached\")"
            )),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::Sequential => "sequential",
            StrategyKind::Parallel => "parallel",
            StrategyKind::Cached => "cached",
        };
        f.write_str(s)
    }
}

/// Where the result cache is persisted between sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStorageMode {
    /// `.sentinel/cache.json` under the project root.
    #[default]
    File,
    /// Process lifetime only.
    Memory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes_case_insensitively() {
        assert_eq!("Related".parse::<WatchMode>(), Ok(WatchMode::Related));
        assert_eq!(" all ".parse::<WatchMode>(), Ok(WatchMode::All));
        assert!("everything".parse::<WatchMode>().is_err());
        assert_eq!("CACHED".parse::<StrategyKind>(), Ok(StrategyKind::Cached));
    }
}

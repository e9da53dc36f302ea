// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::WatchMode;

/// Command-line arguments for `sentinel`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sentinel",
    version,
    about = "Watch a Go module and re-run the affected tests on every change.",
    long_about = None
)]
pub struct CliArgs {
    /// Directories to watch, relative to the project root.
    ///
    /// Overrides `[watch].paths` from the config file.
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Sentinel.toml` in the current working directory. A missing
    /// file means "all defaults".
    #[arg(long, value_name = "PATH", default_value = "Sentinel.toml")]
    pub config: String,

    /// Run every test target once and exit (non-zero if anything failed).
    #[arg(long)]
    pub once: bool,

    /// Which targets a change resolves to.
    #[arg(long, value_enum, value_name = "MODE")]
    pub mode: Option<WatchMode>,

    /// Size of the worker pool (0 = available parallelism).
    #[arg(long, short = 'j', value_name = "N")]
    pub workers: Option<usize>,

    /// Per-target timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Only run tests whose name matches this regex (passed to `-run`).
    #[arg(long, value_name = "PATTERN")]
    pub test: Option<String>,

    /// Disable the result cache for this session.
    #[arg(long)]
    pub no_cache: bool,

    /// Print every test result as it arrives.
    #[arg(long, short)]
    pub verbose: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SENTINEL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load config, discover targets and print them without running anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

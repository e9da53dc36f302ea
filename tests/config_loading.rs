// tests/config_loading.rs

mod common;
use crate::common::builders::ConfigFileBuilder;
use crate::common::{Outcome, init_tracing};

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tempfile::tempdir;

use sentinel::cli::CliArgs;
use sentinel::config::loader::{apply_cli_overrides, load_and_validate, load_with_overrides};
use sentinel::config::{ConfigFile, RawConfigFile};
use sentinel::errors::SentinelError;
use sentinel::types::{CacheStorageMode, StrategyKind, WatchMode};

fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("Sentinel.toml");
    fs::write(&path, contents).expect("write config");
    (dir, path)
}

#[test]
fn missing_file_yields_defaults() -> Outcome {
    init_tracing();
    let dir = tempdir()?;
    let cfg = load_and_validate(dir.path().join("nope.toml"))?;

    assert_eq!(cfg.watch.mode, WatchMode::Related);
    assert_eq!(cfg.watch.paths, vec![PathBuf::from(".")]);
    assert_eq!(cfg.debounce_window(), Duration::from_millis(100));
    assert_eq!(cfg.watch.related_depth, None);
    assert!(cfg.watch.run_on_start);
    assert_eq!(cfg.exec.command, "go test -json {target}");
    assert_eq!(cfg.exec.context_lines, 2);
    assert_eq!(cfg.exec.run, None);
    assert_eq!(cfg.target_timeout(), Duration::from_secs(120));
    assert!(cfg.cache.enabled);
    assert_eq!(cfg.cache.storage, CacheStorageMode::File);
    assert_eq!(cfg.effective_strategy(), StrategyKind::Cached);
    assert!(cfg.effective_workers() >= 1);
    Ok(())
}

#[test]
fn full_file_is_parsed() -> Outcome {
    init_tracing();
    let (_dir, path) = write_config(
        r#"
[watch]
mode = "changed"
paths = ["pkg", "cmd"]
debounce_ms = 250
exclude = ["**/testdata/**"]
related_depth = 3
run_on_start = false

[exec]
strategy = "sequential"
workers = 3
timeout_secs = 30
command = "go test -json -count=1 {target}"
run = "TestCheckout|TestRefund"
context_lines = 4
verbose = true

[cache]
enabled = false
storage = "memory"
"#,
    );

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.watch.mode, WatchMode::Changed);
    assert_eq!(cfg.watch.paths.len(), 2);
    assert_eq!(cfg.watch.debounce_ms, 250);
    assert_eq!(cfg.watch.related_depth, Some(3));
    assert!(!cfg.watch.run_on_start);
    assert_eq!(cfg.effective_strategy(), StrategyKind::Sequential);
    assert_eq!(cfg.effective_workers(), 3);
    assert_eq!(cfg.exec.context_lines, 4);
    assert_eq!(cfg.exec.run.as_deref(), Some("TestCheckout|TestRefund"));
    assert!(cfg.exec.verbose);
    assert!(!cfg.cache.enabled);
    assert_eq!(cfg.cache.storage, CacheStorageMode::Memory);
    Ok(())
}

#[test]
fn strategy_defaults_to_parallel_without_cache() {
    let cfg = ConfigFileBuilder::new().cache_enabled(false).build();
    assert_eq!(cfg.effective_strategy(), StrategyKind::Parallel);
}

fn expect_config_error(raw: RawConfigFile, needle: &str) {
    match ConfigFile::try_from(raw) {
        Err(SentinelError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "unexpected message: {msg}");
        }
        other => panic!("expected config error mentioning {needle:?}, got {other:?}"),
    }
}

#[test]
fn invalid_values_are_rejected() {
    expect_config_error(ConfigFileBuilder::new().debounce_ms(0).raw(), "debounce_ms");
    expect_config_error(ConfigFileBuilder::new().timeout_secs(0).raw(), "timeout_secs");
    expect_config_error(ConfigFileBuilder::new().command("go test ./...").raw(), "{target}");
    expect_config_error(ConfigFileBuilder::new().exclude("a[").raw(), "a[");
    expect_config_error(
        ConfigFileBuilder::new()
            .strategy(StrategyKind::Cached)
            .cache_enabled(false)
            .raw(),
        "cache",
    );
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let (_dir, path) = write_config("[watch\nmode = ");
    assert!(matches!(load_and_validate(&path), Err(SentinelError::TomlError(_))));
}

#[test]
fn unknown_mode_is_rejected() {
    let (_dir, path) = write_config("[watch]\nmode = \"everything\"\n");
    assert!(load_and_validate(&path).is_err());
}

#[test]
fn cli_flags_override_file_values() -> Outcome {
    let (_dir, path) = write_config(
        "[watch]\nmode = \"changed\"\n[exec]\nstrategy = \"cached\"\ntimeout_secs = 30\n",
    );
    let args = CliArgs::try_parse_from([
        "sentinel",
        "--mode",
        "all",
        "-j",
        "7",
        "--timeout",
        "9",
        "--no-cache",
        "--verbose",
        "svc",
    ])?;

    let cfg = load_with_overrides(&path, &args)?;
    assert_eq!(cfg.watch.mode, WatchMode::All);
    assert_eq!(cfg.watch.paths, vec![PathBuf::from("svc")]);
    assert_eq!(cfg.effective_workers(), 7);
    assert_eq!(cfg.exec.timeout_secs, 9);
    assert!(cfg.exec.verbose);
    assert!(!cfg.cache.enabled);
    // `--no-cache` drops the explicit cached strategy.
    assert_eq!(cfg.effective_strategy(), StrategyKind::Parallel);
    Ok(())
}

#[test]
fn test_flag_replaces_the_configured_run_pattern() -> Outcome {
    let (_dir, path) = write_config("[exec]\nrun = \"TestCheckout\"\n");

    let kept = load_with_overrides(&path, &CliArgs::try_parse_from(["sentinel"])?)?;
    assert_eq!(kept.exec.run.as_deref(), Some("TestCheckout"));

    let args = CliArgs::try_parse_from(["sentinel", "--test", "^TestRefund$"])?;
    let cfg = load_with_overrides(&path, &args)?;
    assert_eq!(cfg.exec.run.as_deref(), Some("^TestRefund$"));
    Ok(())
}

#[test]
fn cli_override_is_validated() -> Outcome {
    let args = CliArgs::try_parse_from(["sentinel", "--timeout", "0"])?;
    let mut raw = RawConfigFile::default();
    apply_cli_overrides(&mut raw, &args);
    assert!(ConfigFile::try_from(raw).is_err());
    Ok(())
}

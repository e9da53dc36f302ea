// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod parser;
pub mod render;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, ResultCache, load_or_cold, store_for};
use crate::cli::CliArgs;
use crate::config::loader::load_with_overrides;
use crate::config::model::ConfigFile;
use crate::coordinator::{
    Coordinator, CoordinatorEvent, CoordinatorOptions, CoreCoordinator, TargetResolver,
};
use crate::exec::{ExecutionEngine, HarnessCommand, ProcessRunner, RealExecutionBackend};
use crate::fs::{FileSystem, RealFileSystem};
use crate::graph::{Fingerprinter, PackageIndex};
use crate::metrics::RunMetrics;
use crate::model::RunSummary;
use crate::render::{IncrementalRenderer, RenderEvent, RenderOptions, run_renderer};
use crate::types::StrategyKind;
use crate::watch::PathFilter;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and the package index
/// - the result cache (loaded here, saved on the way out)
/// - execution engine, coordinator and renderer
/// - (optional) file watcher
/// - Ctrl-C handling
///
/// Returns the summary of the last completed run, if any.
pub async fn run(args: CliArgs) -> Result<Option<RunSummary>> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_with_overrides(&config_path, &args)?;
    let project_root = config_root_dir(&config_path);
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let filter = PathFilter::from_config(&cfg.watch)?;
    let index = PackageIndex::scan(fs.clone(), project_root.clone(), filter.clone())
        .with_context(|| format!("indexing Go packages under {:?}", project_root))?;

    if args.dry_run {
        print_dry_run(&cfg, &index);
        return Ok(None);
    }

    // Cache, injected into both the engine and the coordinator.
    let strategy = cfg.effective_strategy();
    let mut store = store_for(cfg.cache.storage, &project_root, fs.clone());
    let cache = (cfg.cache.enabled && strategy == StrategyKind::Cached)
        .then(|| Arc::new(load_or_cold(store.as_ref())));

    let (coord_tx, coord_rx) = mpsc::channel::<CoordinatorEvent>(256);

    let harness = HarnessCommand::new(cfg.exec.command.clone(), project_root.clone())
        .with_run_pattern(cfg.exec.run.clone());
    let command_line = harness.describe();
    let runner = ProcessRunner::new(
        harness,
        cfg.target_timeout(),
        fs.clone(),
        cfg.exec.context_lines,
    );
    let engine = ExecutionEngine::new(strategy, runner, cfg.effective_workers(), cache.clone());
    let executor = RealExecutionBackend::new(engine, coord_tx.clone());

    // Renderer task writing to stdout.
    let (render_tx, render_rx) = mpsc::channel::<RenderEvent>(256);
    let renderer = IncrementalRenderer::new(RenderOptions {
        verbose: cfg.exec.verbose,
    });
    let render_task = tokio::spawn(run_renderer(renderer, render_rx, std::io::stdout()));

    // Optional file watcher (disabled in --once mode).
    let _watch_pipeline = if !args.once {
        let roots: Vec<PathBuf> = cfg
            .watch
            .paths
            .iter()
            .map(|p| project_root.join(p))
            .collect();
        Some(watch::spawn_watch_pipeline(
            project_root.clone(),
            roots,
            filter,
            cfg.debounce_window(),
            coord_tx.clone(),
        )?)
    } else {
        None
    };

    // Ctrl-C → graceful shutdown.
    {
        let tx = coord_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(CoordinatorEvent::ShutdownRequested).await;
        });
    }

    if args.once || cfg.watch.run_on_start {
        coord_tx.send(CoordinatorEvent::RunAllRequested).await?;
    }
    drop(coord_tx);

    let resolver = TargetResolver::new(
        index,
        Fingerprinter::new(fs.clone(), project_root.clone()).with_command(command_line),
        cfg.watch.mode,
        cfg.watch.related_depth,
    );
    let options = CoordinatorOptions {
        exit_when_idle: args.once,
    };
    let core = CoreCoordinator::new(resolver, options);
    let metrics = Arc::new(RunMetrics::new());

    info!(
        root = %project_root.display(),
        mode = %cfg.watch.mode,
        strategy = %strategy,
        once = args.once,
        "sentinel started"
    );

    let coordinator = Coordinator::new(
        core,
        coord_rx,
        executor,
        render_tx,
        cache.clone(),
        metrics.clone(),
    );
    let outcome = coordinator.run().await;

    // The coordinator owned the only render sender; the renderer drains and stops.
    if let Err(e) = render_task.await {
        warn!(error = %e, "renderer task failed");
    }

    if let Some(cache) = &cache {
        save_cache(cache, store.as_mut());
    }

    let snapshot = metrics.snapshot(cache.as_deref());
    info!(
        runs_triggered = snapshot.runs_triggered,
        runs_completed = snapshot.runs_completed,
        runs_superseded = snapshot.runs_superseded,
        cache_hit_rate = snapshot.cache_hit_rate,
        average_run_ms = snapshot.average_run_duration.as_millis() as u64,
        targets_per_run = snapshot.targets_per_run,
        "session metrics"
    );

    Ok(outcome?)
}

fn save_cache(cache: &ResultCache, store: &mut dyn CacheStore) {
    let entries = cache.entries();
    if let Err(e) = store.save(&entries) {
        warn!(error = %format!("{e:#}"), "failed to persist result cache");
    }
}

/// Figure out the project root.
///
/// - A config path with a non-empty parent (e.g. "svc/Sentinel.toml") makes
///   that directory the root.
/// - A bare filename falls back to the current working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Print the resolved config and discovered targets.
fn print_dry_run(cfg: &ConfigFile, index: &PackageIndex) {
    println!("sentinel dry-run");
    println!("  root = {}", index.root().display());
    println!("  module = {}", index.module_path().unwrap_or("<none>"));
    println!("  watch.mode = {}", cfg.watch.mode);
    println!("  watch.paths = {:?}", cfg.watch.paths);
    println!("  watch.debounce_ms = {}", cfg.watch.debounce_ms);
    match cfg.watch.related_depth {
        Some(depth) => println!("  watch.related_depth = {depth}"),
        None => println!("  watch.related_depth = unbounded"),
    }
    println!("  exec.strategy = {}", cfg.effective_strategy());
    println!("  exec.workers = {}", cfg.effective_workers());
    println!("  exec.timeout_secs = {}", cfg.exec.timeout_secs);
    println!("  exec.command = {}", cfg.exec.command);
    if let Some(pattern) = &cfg.exec.run {
        println!("  exec.run = {pattern}");
    }
    println!(
        "  cache = {} ({:?})",
        if cfg.cache.enabled { "enabled" } else { "disabled" },
        cfg.cache.storage
    );
    println!();

    let targets = index.targets();
    println!("targets ({}):", targets.len());
    for dir in targets {
        println!("  - {}", model::package_pattern(&dir));
        let imports = index.imports_of(&dir);
        if !imports.is_empty() {
            println!("      imports: {:?}", imports);
        }
    }

    debug!("dry-run complete (no execution)");
}

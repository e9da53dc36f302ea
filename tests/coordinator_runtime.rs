// tests/coordinator_runtime.rs

mod common;
use crate::common::fake_backend::{FakeBackend, FakeMode, passing_suite};
use crate::common::fixture::{SHOP_ROOT, mock_shop};
use crate::common::{Outcome, init_tracing, with_timeout};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use sentinel::cache::ResultCache;
use sentinel::coordinator::{
    Coordinator, CoordinatorEvent, CoordinatorOptions, CoreCoordinator, TargetResolver,
};
use sentinel::fs::FileSystem;
use sentinel::graph::{Fingerprinter, PackageIndex};
use sentinel::metrics::RunMetrics;
use sentinel::model::{Fingerprint, Generation};
use sentinel::render::RenderEvent;
use sentinel::types::WatchMode;
use sentinel::watch::{ChangeBatch, ChangeKind, FileChangeEvent, PathFilter};

fn core(mode: WatchMode, exit_when_idle: bool) -> CoreCoordinator {
    let fs: Arc<dyn FileSystem> = Arc::new(mock_shop());
    let filter = PathFilter::new(&["**/*.go".to_string(), "**/go.mod".to_string()], &[])
        .expect("filter");
    let index = PackageIndex::scan(Arc::clone(&fs), SHOP_ROOT, filter).expect("scan");
    let resolver = TargetResolver::new(index, Fingerprinter::new(fs, SHOP_ROOT), mode, None);
    CoreCoordinator::new(resolver, CoordinatorOptions { exit_when_idle })
}

fn modified(path: &str) -> CoordinatorEvent {
    CoordinatorEvent::BatchSettled(ChangeBatch {
        events: vec![FileChangeEvent::new(path, ChangeKind::Modified)],
        settled_at: Instant::now(),
    })
}

async fn drain(mut rx: mpsc::Receiver<RenderEvent>) -> Vec<RenderEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn once_mode_runs_everything_and_returns_the_summary() -> Outcome {
    init_tracing();
    let (coord_tx, coord_rx) = mpsc::channel(64);
    let (render_tx, render_rx) = mpsc::channel(64);
    let backend = FakeBackend::new(coord_tx.clone(), FakeMode::Complete);
    let metrics = Arc::new(RunMetrics::new());

    let coordinator = Coordinator::new(
        core(WatchMode::Related, true),
        coord_rx,
        backend,
        render_tx,
        None,
        Arc::clone(&metrics),
    );

    coord_tx.send(CoordinatorEvent::RunAllRequested).await?;
    drop(coord_tx);

    let summary = with_timeout(coordinator.run()).await?.expect("a completed run");
    assert_eq!(summary.generation, Generation(1));
    let suites: Vec<PathBuf> = summary.suites.iter().map(|s| s.file_path.clone()).collect();
    assert_eq!(
        suites,
        vec![PathBuf::from("api"), PathBuf::from("e2e"), PathBuf::from("store")]
    );
    assert!(summary.is_success());

    let rendered = with_timeout(drain(render_rx)).await;
    assert!(matches!(rendered.last(), Some(RenderEvent::RunComplete(s)) if s.totals.passed == 3));
    let completed = rendered
        .iter()
        .filter(|e| matches!(e, RenderEvent::SuiteCompleted { .. }))
        .count();
    assert_eq!(completed, 3);

    let snapshot = metrics.snapshot(None);
    assert_eq!(snapshot.runs_triggered, 1);
    assert_eq!(snapshot.runs_completed, 1);
    assert_eq!(snapshot.targets_per_run, 3.0);
    Ok(())
}

#[tokio::test]
async fn newer_batch_cancels_the_running_generation() -> Outcome {
    init_tracing();
    let (coord_tx, coord_rx) = mpsc::channel(64);
    let (render_tx, render_rx) = mpsc::channel(64);
    let backend = FakeBackend::new(coord_tx.clone(), FakeMode::Hold);
    let recorder = backend.recorder();
    let metrics = Arc::new(RunMetrics::new());

    let coordinator = Coordinator::new(
        core(WatchMode::Changed, false),
        coord_rx,
        backend,
        render_tx,
        None,
        Arc::clone(&metrics),
    );
    let handle = tokio::spawn(coordinator.run());

    coord_tx.send(modified("store/store.go")).await?;
    coord_tx.send(modified("api/api.go")).await?;

    with_timeout(async {
        while recorder.lock().expect("recorder").len() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    {
        let dispatched = recorder.lock().expect("recorder");
        let (first_request, first_cancel) = &dispatched[0];
        let (second_request, second_cancel) = &dispatched[1];
        assert_eq!(first_request.generation, Generation(1));
        assert_eq!(second_request.generation, Generation(2));
        assert!(first_cancel.is_cancelled());
        assert!(!second_cancel.is_cancelled());
    }

    coord_tx.send(CoordinatorEvent::ShutdownRequested).await?;
    let summary = with_timeout(handle).await??;
    assert!(summary.is_none());

    let rendered = with_timeout(drain(render_rx)).await;
    assert!(rendered.iter().any(
        |e| matches!(e, RenderEvent::RunSuperseded { generation } if *generation == Generation(1))
    ));
    assert_eq!(metrics.snapshot(None).runs_superseded, 1);
    Ok(())
}

#[tokio::test]
async fn dropping_the_coordinator_cancels_outstanding_work() -> Outcome {
    init_tracing();
    let (coord_tx, coord_rx) = mpsc::channel(64);
    let (render_tx, _render_rx) = mpsc::channel(64);
    let backend = FakeBackend::new(coord_tx.clone(), FakeMode::Hold);
    let recorder = backend.recorder();

    let coordinator = Coordinator::new(
        core(WatchMode::Changed, false),
        coord_rx,
        backend,
        render_tx,
        None,
        Arc::new(RunMetrics::new()),
    );

    coord_tx.send(modified("store/store.go")).await?;
    coord_tx.send(CoordinatorEvent::ShutdownRequested).await?;
    with_timeout(coordinator.run()).await?;

    let dispatched = recorder.lock().expect("recorder");
    assert_eq!(dispatched.len(), 1);
    assert!(dispatched[0].1.is_cancelled());
    Ok(())
}

#[tokio::test]
async fn settled_batches_evict_dependent_cache_entries() -> Outcome {
    init_tracing();
    let cache = Arc::new(ResultCache::new());
    cache.put(
        Fingerprint("api".to_string()),
        passing_suite("api"),
        vec![PathBuf::from("api/api.go"), PathBuf::from("store/store.go")],
    );
    cache.put(
        Fingerprint("util".to_string()),
        passing_suite("util"),
        vec![PathBuf::from("util/util.go")],
    );

    let (coord_tx, coord_rx) = mpsc::channel(64);
    let (render_tx, _render_rx) = mpsc::channel(64);
    let backend = FakeBackend::new(coord_tx.clone(), FakeMode::Hold);

    let coordinator = Coordinator::new(
        core(WatchMode::Changed, false),
        coord_rx,
        backend,
        render_tx,
        Some(Arc::clone(&cache)),
        Arc::new(RunMetrics::new()),
    );

    coord_tx.send(modified("store/store.go")).await?;
    coord_tx.send(CoordinatorEvent::ShutdownRequested).await?;
    with_timeout(coordinator.run()).await?;

    assert_eq!(cache.len(), 1);
    assert!(cache.get(&Fingerprint("util".to_string())).is_some());
    Ok(())
}

// tests/debouncer.rs

mod common;
use crate::common::{init_tracing, with_timeout};

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use tokio::sync::mpsc;

use sentinel::watch::{ChangeKind, Debouncer, FileChangeEvent, debounce};

const WINDOW: Duration = Duration::from_millis(100);

fn event(path: &str, kind: ChangeKind) -> FileChangeEvent {
    FileChangeEvent::new(path, kind)
}

#[test]
fn burst_settles_into_one_batch_after_quiet_period() {
    let t0 = Instant::now();
    let mut d = Debouncer::new(WINDOW);

    d.push(event("a.go", ChangeKind::Modified), t0);
    d.push(event("b.go", ChangeKind::Modified), t0 + Duration::from_millis(60));
    d.push(event("a.go", ChangeKind::Modified), t0 + Duration::from_millis(120));

    // The last event re-armed the timer.
    assert!(d.poll(t0 + Duration::from_millis(200)).is_none());
    assert_eq!(d.deadline(), Some(t0 + Duration::from_millis(220)));

    let batch = d.poll(t0 + Duration::from_millis(220)).expect("batch");
    let paths: Vec<_> = batch.paths().cloned().collect();
    assert_eq!(paths, vec![PathBuf::from("a.go"), PathBuf::from("b.go")]);
    assert!(!d.is_pending());
    assert!(d.poll(t0 + Duration::from_secs(5)).is_none());
}

#[test]
fn kinds_merge_per_path() {
    let t0 = Instant::now();
    let mut d = Debouncer::new(WINDOW);
    d.push(event("new.go", ChangeKind::Created), t0);
    d.push(event("new.go", ChangeKind::Modified), t0);
    d.push(event("old.go", ChangeKind::Modified), t0);
    d.push(event("old.go", ChangeKind::Removed), t0);

    let batch = d.flush(t0).expect("batch");
    let kinds: Vec<_> = batch.events.iter().map(|e| (e.path.clone(), e.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            (PathBuf::from("new.go"), ChangeKind::Created),
            (PathBuf::from("old.go"), ChangeKind::Removed),
        ]
    );
    assert!(batch.has_structural_change());
}

#[test]
fn flush_on_empty_is_none() {
    let mut d = Debouncer::new(WINDOW);
    assert!(d.flush(Instant::now()).is_none());
}

proptest! {
    /// However events are spaced, every path shows up exactly once across the
    /// emitted batches, and no batch is released before the window elapses.
    #[test]
    fn no_loss_no_duplication(
        steps in prop::collection::vec((0usize..6, 0u64..250), 1..40)
    ) {
        let t0 = Instant::now();
        let mut d = Debouncer::new(WINDOW);
        let mut now = t0;
        let mut last_push = t0;
        let mut batches = Vec::new();
        let mut sent = BTreeSet::new();

        for (file, gap) in steps {
            now += Duration::from_millis(gap);
            if let Some(batch) = d.poll(now) {
                prop_assert!(now.duration_since(last_push) >= WINDOW);
                batches.push(batch);
            }
            let path = format!("pkg/f{file}.go");
            sent.insert(PathBuf::from(&path));
            d.push(event(&path, ChangeKind::Modified), now);
            last_push = now;
        }
        if let Some(batch) = d.poll(now + WINDOW) {
            batches.push(batch);
        }
        prop_assert!(!d.is_pending());

        let mut seen = BTreeSet::new();
        for batch in &batches {
            let mut in_batch = BTreeSet::new();
            for p in batch.paths() {
                prop_assert!(in_batch.insert(p.clone()), "duplicate path inside one batch");
                seen.insert(p.clone());
            }
        }
        prop_assert_eq!(seen, sent);
    }
}

#[tokio::test]
async fn async_debouncer_emits_single_batch() {
    init_tracing();
    let (tx, rx) = mpsc::channel(16);
    let mut batches = debounce(rx, Duration::from_millis(50));

    let started = Instant::now();
    for name in ["a.go", "b.go", "a.go"] {
        tx.send(event(name, ChangeKind::Modified)).await.expect("send");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let batch = with_timeout(batches.recv()).await.expect("batch");
    assert_eq!(batch.len(), 2);
    assert!(started.elapsed() >= Duration::from_millis(50));

    // Nothing else is pending.
    let extra = tokio::time::timeout(Duration::from_millis(150), batches.recv()).await;
    assert!(extra.is_err(), "unexpected second batch");
}

#[tokio::test]
async fn closing_input_flushes_pending_events() {
    init_tracing();
    let (tx, rx) = mpsc::channel(16);
    let mut batches = debounce(rx, Duration::from_secs(30));

    tx.send(event("main.go", ChangeKind::Modified)).await.expect("send");
    drop(tx);

    let batch = with_timeout(batches.recv()).await.expect("final batch");
    assert_eq!(batch.len(), 1);
    assert!(with_timeout(batches.recv()).await.is_none());
}

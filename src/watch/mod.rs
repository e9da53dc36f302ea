// src/watch/mod.rs

//! File watching and change debouncing.
//!
//! This module is responsible for:
//! - Compiling include/exclude glob patterns (`patterns`).
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Coalescing bursts of changes into settled batches (`debouncer`).
//!
//! It does **not** know about packages or tests; it only turns filesystem
//! changes into coordinator events.

pub mod debouncer;
pub mod event;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::coordinator::CoordinatorEvent;
use crate::errors::Result;

pub use debouncer::{Debouncer, debounce};
pub use event::{ChangeBatch, ChangeKind, FileChangeEvent};
pub use patterns::{DEFAULT_EXCLUDES, PathFilter};
pub use watcher::{SourceWatcher, WatchStream, classify};

/// Background tasks feeding the coordinator; aborted on drop.
#[derive(Debug)]
pub struct WatchPipeline {
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for WatchPipeline {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Start watching and forward both raw observations and settled batches into
/// the coordinator channel.
///
/// Every change is reported as `ChangeObserved` (so the coordinator can enter
/// its debouncing phase) and also fed through the debouncer, whose batches
/// arrive as `BatchSettled`.
pub fn spawn_watch_pipeline(
    project_root: PathBuf,
    roots: Vec<PathBuf>,
    filter: PathFilter,
    window: Duration,
    coordinator_tx: mpsc::Sender<CoordinatorEvent>,
) -> Result<WatchPipeline> {
    let watcher = SourceWatcher::new(project_root, roots, filter);
    let mut stream = watcher.watch()?;

    let (change_tx, change_rx) = mpsc::channel::<FileChangeEvent>(256);
    let mut batches = debounce(change_rx, window);

    let observed_tx = coordinator_tx.clone();
    let tap = tokio::spawn(async move {
        while let Some(event) = stream.recv().await {
            if observed_tx
                .send(CoordinatorEvent::ChangeObserved(event.clone()))
                .await
                .is_err()
            {
                break;
            }
            if change_tx.send(event).await.is_err() {
                break;
            }
        }
        debug!("watch stream closed");
    });

    let settle = tokio::spawn(async move {
        while let Some(batch) = batches.recv().await {
            if coordinator_tx
                .send(CoordinatorEvent::BatchSettled(batch))
                .await
                .is_err()
            {
                break;
            }
        }
        debug!("batch forwarding finished");
    });

    Ok(WatchPipeline {
        tasks: vec![tap, settle],
    })
}

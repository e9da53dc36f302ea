// src/watch/debouncer.rs

//! Coalesces bursts of file changes into settled batches.
//!
//! [`Debouncer`] is the pure state (pending set plus deadline) and is driven
//! with explicit instants; [`debounce`] wraps it in a tokio task that owns the
//! timer.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::watch::event::{ChangeBatch, FileChangeEvent};

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: BTreeMap<PathBuf, FileChangeEvent>,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: BTreeMap::new(),
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Merge `event` into the pending set and re-arm the deadline.
    pub fn push(&mut self, event: FileChangeEvent, now: Instant) {
        match self.pending.get_mut(&event.path) {
            Some(existing) => {
                existing.kind = existing.kind.merge(event.kind);
                existing.timestamp = event.timestamp;
            }
            None => {
                self.pending.insert(event.path.clone(), event);
            }
        }
        self.deadline = Some(now + self.window);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Release the batch if the quiet period has elapsed at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<ChangeBatch> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.flush(now),
            _ => None,
        }
    }

    /// Release whatever is pending regardless of the deadline.
    pub fn flush(&mut self, now: Instant) -> Option<ChangeBatch> {
        self.deadline = None;
        if self.pending.is_empty() {
            return None;
        }
        let events = std::mem::take(&mut self.pending).into_values().collect();
        Some(ChangeBatch {
            events,
            settled_at: now,
        })
    }
}

/// Spawn a debouncing task between a stream of changes and its consumer.
///
/// When `events` closes, anything still pending is flushed as a final batch.
pub fn debounce(
    mut events: mpsc::Receiver<FileChangeEvent>,
    window: Duration,
) -> mpsc::Receiver<ChangeBatch> {
    let (batch_tx, batch_rx) = mpsc::channel(16);

    tokio::spawn(async move {
        let mut debouncer = Debouncer::new(window);

        loop {
            let deadline = debouncer.deadline();
            let timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at.into()).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => {
                        trace!(path = %event.path.display(), kind = ?event.kind, "change pending");
                        debouncer.push(event, Instant::now());
                    }
                    None => {
                        if let Some(batch) = debouncer.flush(Instant::now()) {
                            let _ = batch_tx.send(batch).await;
                        }
                        break;
                    }
                },
                _ = timer => {
                    if let Some(batch) = debouncer.poll(Instant::now()) {
                        debug!(paths = batch.len(), "change batch settled");
                        if batch_tx.send(batch).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        debug!("debouncer finished");
    });

    batch_rx
}

// src/exec/cancel.rs

//! Generation-based cooperative cancellation.
//!
//! The coordinator publishes the active [`Generation`] on a `watch` channel;
//! work tagged with any other generation is stale and should stop.

use std::sync::Arc;

use tokio::sync::watch;

use crate::model::Generation;

pub fn generation_channel() -> (watch::Sender<Generation>, watch::Receiver<Generation>) {
    watch::channel(Generation::default())
}

#[derive(Debug, Clone)]
pub struct CancelSignal {
    generation: Generation,
    rx: watch::Receiver<Generation>,
    _owner: Option<Arc<watch::Sender<Generation>>>,
}

impl CancelSignal {
    pub fn new(generation: Generation, rx: watch::Receiver<Generation>) -> Self {
        Self {
            generation,
            rx,
            _owner: None,
        }
    }

    /// A signal that never fires; for one-off executions outside a session.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(Generation::default());
        Self {
            generation: Generation::default(),
            rx,
            _owner: Some(Arc::new(tx)),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() != self.generation || self.rx.has_changed().is_err()
    }

    /// Resolves once another generation becomes active or the coordinator
    /// goes away.
    pub async fn cancelled(&mut self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

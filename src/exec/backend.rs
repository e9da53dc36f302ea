// src/exec/backend.rs

//! Pluggable execution backend.
//!
//! The coordinator talks to an `ExecutionBackend` instead of the engine
//! directly, so tests can swap in a fake that never spawns processes.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tracing::debug;

use crate::coordinator::CoordinatorEvent;
use crate::errors::Result;
use crate::exec::cancel::CancelSignal;
use crate::exec::engine::ExecutionEngine;
use crate::model::RunRequest;

/// Trait abstracting how run requests are executed.
///
/// Implementations report back by sending `CoordinatorEvent::Execution` for
/// every message and one `CoordinatorEvent::RunFinished` when the request is
/// exhausted.
pub trait ExecutionBackend: Send {
    fn dispatch(
        &mut self,
        request: RunRequest,
        cancel: CancelSignal,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production backend: runs requests on the [`ExecutionEngine`].
pub struct RealExecutionBackend {
    engine: ExecutionEngine,
    coordinator_tx: mpsc::Sender<CoordinatorEvent>,
}

impl RealExecutionBackend {
    pub fn new(engine: ExecutionEngine, coordinator_tx: mpsc::Sender<CoordinatorEvent>) -> Self {
        Self {
            engine,
            coordinator_tx,
        }
    }
}

impl ExecutionBackend for RealExecutionBackend {
    fn dispatch(
        &mut self,
        request: RunRequest,
        cancel: CancelSignal,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the forwarding task doesn't borrow `self`.
        let tx = self.coordinator_tx.clone();
        let generation = request.generation;
        let mut messages = self.engine.execute(request, cancel);

        Box::pin(async move {
            tokio::spawn(async move {
                while let Some(msg) = messages.recv().await {
                    if tx.send(CoordinatorEvent::Execution(msg)).await.is_err() {
                        debug!(generation = %generation, "coordinator gone; dropping execution messages");
                        return;
                    }
                }
                let _ = tx.send(CoordinatorEvent::RunFinished { generation }).await;
            });
            Ok(())
        })
    }
}

// src/exec/pool.rs

//! Bounded worker pool used by the parallel and cached strategies.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error};

use crate::exec::cancel::CancelSignal;
use crate::exec::process::ProcessRunner;
use crate::exec::strategy::{ExecutionStrategy, StrategyFuture};
use crate::model::{ExecutionError, ExecutionMessage, ExecutionUpdate, Generation, RunRequest, TestTarget};

/// At most `workers` targets run at once; a dispatcher hands queued targets
/// to free workers in request order.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    runner: Arc<ProcessRunner>,
    workers: usize,
}

impl WorkerPool {
    pub fn new(runner: Arc<ProcessRunner>, workers: usize) -> Self {
        Self {
            runner,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn run_targets(
        &self,
        targets: Vec<Arc<TestTarget>>,
        cancel: CancelSignal,
        tx: mpsc::Sender<ExecutionMessage>,
    ) {
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut running = JoinSet::new();
        let mut in_flight: HashMap<Id, Arc<TestTarget>> = HashMap::new();
        let mut dispatcher = cancel.clone();
        let total = targets.len();

        for (queued, target) in targets.into_iter().enumerate() {
            let permit = tokio::select! {
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = dispatcher.cancelled() => {
                    debug!(
                        generation = %cancel.generation(),
                        dropped = total - queued,
                        "dropping queued targets after cancellation"
                    );
                    break;
                }
            };

            let runner = Arc::clone(&self.runner);
            let worker_tx = tx.clone();
            let mut worker_cancel = cancel.clone();
            let job = Arc::clone(&target);
            let handle = running.spawn(async move {
                let _permit = permit;
                runner.run_target(job, &mut worker_cancel, &worker_tx).await;
            });
            in_flight.insert(handle.id(), target);
        }

        while let Some(joined) = running.join_next_with_id().await {
            match joined {
                Ok((id, _)) => {
                    in_flight.remove(&id);
                }
                Err(e) => {
                    let Some(target) = in_flight.remove(&e.id()) else {
                        error!(error = %e, "test worker failed for an unknown target");
                        continue;
                    };
                    if cancel.is_cancelled() {
                        debug!(target = %target.path.display(), error = %e, "worker of a cancelled run ended abnormally");
                        continue;
                    }
                    let msg = worker_failed(cancel.generation(), target, &e);
                    if tx.send(msg).await.is_err() {
                        debug!("receiver gone before worker failure was reported");
                    }
                }
            }
        }
    }
}

/// The `SuiteFinished` reporting a worker that panicked or was aborted, so the
/// run still accounts for its target.
pub(crate) fn worker_failed(
    generation: Generation,
    target: Arc<TestTarget>,
    error: &JoinError,
) -> ExecutionMessage {
    let reason = if error.is_panic() {
        "test worker panicked"
    } else {
        "test worker was aborted"
    };
    error!(target = %target.path.display(), %generation, error = %error, "{reason}");
    ExecutionMessage {
        generation,
        target,
        update: ExecutionUpdate::SuiteFinished(Err(ExecutionError::Worker(reason.to_string()))),
    }
}

impl ExecutionStrategy for WorkerPool {
    fn run<'a>(
        &'a self,
        request: RunRequest,
        cancel: CancelSignal,
        tx: mpsc::Sender<ExecutionMessage>,
    ) -> StrategyFuture<'a> {
        let targets = request.targets.into_iter().map(Arc::new).collect();
        Box::pin(self.run_targets(targets, cancel, tx))
    }
}

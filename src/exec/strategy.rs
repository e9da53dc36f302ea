// src/exec/strategy.rs

//! Execution strategies.
//!
//! Every strategy streams the same message protocol per target:
//! `SuiteStarted`, any number of `TestFinished`, then `SuiteFinished`
//! (omitted when the target was cancelled).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cache::ResultCache;
use crate::exec::cancel::CancelSignal;
use crate::exec::pool::WorkerPool;
use crate::exec::process::{ProcessRunner, TargetOutcome};
use crate::model::{ExecutionMessage, ExecutionUpdate, RunRequest, TestSuite, TestTarget};

pub type StrategyFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

pub trait ExecutionStrategy: Send + Sync {
    /// Execute every target of `request`, streaming progress into `tx`.
    ///
    /// Resolves once all targets have finished or been cancelled.
    fn run<'a>(
        &'a self,
        request: RunRequest,
        cancel: CancelSignal,
        tx: mpsc::Sender<ExecutionMessage>,
    ) -> StrategyFuture<'a>;
}

/// One target at a time, in request order.
#[derive(Debug, Clone)]
pub struct SequentialStrategy {
    runner: Arc<ProcessRunner>,
}

impl SequentialStrategy {
    pub fn new(runner: Arc<ProcessRunner>) -> Self {
        Self { runner }
    }
}

impl ExecutionStrategy for SequentialStrategy {
    fn run<'a>(
        &'a self,
        request: RunRequest,
        mut cancel: CancelSignal,
        tx: mpsc::Sender<ExecutionMessage>,
    ) -> StrategyFuture<'a> {
        Box::pin(async move {
            let total = request.targets.len();
            for (done, target) in request.targets.into_iter().enumerate() {
                if cancel.is_cancelled() {
                    debug!(
                        generation = %request.generation,
                        dropped = total - done,
                        "dropping queued targets after cancellation"
                    );
                    return;
                }
                let outcome = self.runner.run_target(Arc::new(target), &mut cancel, &tx).await;
                if matches!(outcome, TargetOutcome::Cancelled) {
                    return;
                }
            }
        })
    }
}

/// Replays cached suites and sends the rest through the worker pool,
/// caching clean results as they complete.
#[derive(Debug, Clone)]
pub struct CachedStrategy {
    pool: WorkerPool,
    cache: Arc<ResultCache>,
}

impl CachedStrategy {
    pub fn new(pool: WorkerPool, cache: Arc<ResultCache>) -> Self {
        Self { pool, cache }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Stream a cached suite as if it had just run, with zero elapsed time.
    async fn replay(
        &self,
        target: TestTarget,
        mut suite: TestSuite,
        cancel: &CancelSignal,
        tx: &mpsc::Sender<ExecutionMessage>,
    ) -> bool {
        let target = Arc::new(target);
        suite.elapsed = Duration::ZERO;
        suite.from_cache = true;

        let mut updates = vec![ExecutionUpdate::SuiteStarted];
        updates.extend(suite.results.iter().cloned().map(ExecutionUpdate::TestFinished));
        updates.push(ExecutionUpdate::SuiteFinished(Ok(suite)));

        for update in updates {
            let msg = ExecutionMessage {
                generation: cancel.generation(),
                target: Arc::clone(&target),
                update,
            };
            if tx.send(msg).await.is_err() {
                return false;
            }
        }
        true
    }
}

impl ExecutionStrategy for CachedStrategy {
    fn run<'a>(
        &'a self,
        request: RunRequest,
        cancel: CancelSignal,
        tx: mpsc::Sender<ExecutionMessage>,
    ) -> StrategyFuture<'a> {
        Box::pin(async move {
            let generation = request.generation;
            let mut misses = Vec::new();
            let mut hits = 0usize;

            for target in request.targets {
                if cancel.is_cancelled() {
                    return;
                }
                match self.cache.get(&target.fingerprint) {
                    Some(entry) => {
                        hits += 1;
                        if !self.replay(target, entry.suite, &cancel, &tx).await {
                            return;
                        }
                    }
                    None => misses.push(Arc::new(target)),
                }
            }

            info!(generation = %generation, hits, misses = misses.len(), "cache lookup done");
            if misses.is_empty() {
                return;
            }

            let (pool_tx, mut pool_rx) = mpsc::channel::<ExecutionMessage>(256);
            let cache = Arc::clone(&self.cache);

            let forward = async move {
                while let Some(msg) = pool_rx.recv().await {
                    if let ExecutionUpdate::SuiteFinished(Ok(suite)) = &msg.update
                        && suite.is_cacheable()
                    {
                        cache.put(
                            msg.target.fingerprint.clone(),
                            suite.clone(),
                            msg.target.dependencies.clone(),
                        );
                    }
                    if tx.send(msg).await.is_err() {
                        break;
                    }
                }
            };

            tokio::join!(self.pool.run_targets(misses, cancel, pool_tx), forward);
        })
    }
}

// src/exec/engine.rs

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::exec::cancel::CancelSignal;
use crate::exec::pool::WorkerPool;
use crate::exec::process::ProcessRunner;
use crate::exec::strategy::{CachedStrategy, ExecutionStrategy, SequentialStrategy, StrategyFuture};
use crate::model::{ExecutionMessage, RunRequest};
use crate::types::StrategyKind;

/// Capacity of the per-run message channel.
const MESSAGE_BUFFER: usize = 256;

/// The strategy chosen for the session, fixed at construction.
#[derive(Debug, Clone)]
pub enum ExecutionEngine {
    Sequential(SequentialStrategy),
    Parallel(WorkerPool),
    Cached(CachedStrategy),
}

impl ExecutionEngine {
    /// `Cached` without a cache falls back to `Parallel`.
    pub fn new(
        kind: StrategyKind,
        runner: ProcessRunner,
        workers: usize,
        cache: Option<Arc<ResultCache>>,
    ) -> Self {
        let runner = Arc::new(runner);
        let engine = match (kind, cache) {
            (StrategyKind::Sequential, _) => {
                ExecutionEngine::Sequential(SequentialStrategy::new(runner))
            }
            (StrategyKind::Parallel, _) => ExecutionEngine::Parallel(WorkerPool::new(runner, workers)),
            (StrategyKind::Cached, Some(cache)) => {
                ExecutionEngine::Cached(CachedStrategy::new(WorkerPool::new(runner, workers), cache))
            }
            (StrategyKind::Cached, None) => {
                warn!("cached strategy requested without a cache; running in parallel instead");
                ExecutionEngine::Parallel(WorkerPool::new(runner, workers))
            }
        };
        info!(strategy = %engine.kind(), workers, "execution engine ready");
        engine
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            ExecutionEngine::Sequential(_) => StrategyKind::Sequential,
            ExecutionEngine::Parallel(_) => StrategyKind::Parallel,
            ExecutionEngine::Cached(_) => StrategyKind::Cached,
        }
    }

    /// Start executing `request` in the background and return its message stream.
    ///
    /// The stream ends once every target has finished or been cancelled.
    pub fn execute(&self, request: RunRequest, cancel: CancelSignal) -> mpsc::Receiver<ExecutionMessage> {
        let (tx, rx) = mpsc::channel(MESSAGE_BUFFER);
        let engine = self.clone();
        let generation = request.generation;
        let targets = request.targets.len();

        tokio::spawn(async move {
            debug!(generation = %generation, targets, strategy = %engine.kind(), "executing run");
            engine.run(request, cancel, tx).await;
            debug!(generation = %generation, "run execution finished");
        });

        rx
    }
}

impl ExecutionStrategy for ExecutionEngine {
    fn run<'a>(
        &'a self,
        request: RunRequest,
        cancel: CancelSignal,
        tx: mpsc::Sender<ExecutionMessage>,
    ) -> StrategyFuture<'a> {
        match self {
            ExecutionEngine::Sequential(s) => s.run(request, cancel, tx),
            ExecutionEngine::Parallel(p) => p.run(request, cancel, tx),
            ExecutionEngine::Cached(c) => c.run(request, cancel, tx),
        }
    }
}

// src/coordinator/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::cache::ResultCache;
use crate::errors::Result;
use crate::exec::{CancelSignal, ExecutionBackend};
use crate::metrics::RunMetrics;
use crate::model::{Generation, RunRequest, RunSummary};
use crate::render::RenderEvent;

use super::core::CoreCoordinator;
use super::{CoordinatorEvent, CoreCommand};

/// Async shell around [`CoreCoordinator`].
///
/// Reads events, feeds them to the core and carries out the returned
/// commands: dispatching to the backend, publishing the active generation,
/// forwarding render events and evicting cache entries.
pub struct Coordinator<E: ExecutionBackend> {
    core: CoreCoordinator,
    event_rx: mpsc::Receiver<CoordinatorEvent>,
    executor: E,
    render_tx: mpsc::Sender<RenderEvent>,
    cache: Option<Arc<ResultCache>>,
    metrics: Arc<RunMetrics>,
    generation_tx: watch::Sender<Generation>,
    last_summary: Option<RunSummary>,
}

impl<E: ExecutionBackend> fmt::Debug for Coordinator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("core", &self.core)
            .field("generation", &*self.generation_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl<E: ExecutionBackend> Coordinator<E> {
    pub fn new(
        core: CoreCoordinator,
        event_rx: mpsc::Receiver<CoordinatorEvent>,
        executor: E,
        render_tx: mpsc::Sender<RenderEvent>,
        cache: Option<Arc<ResultCache>>,
        metrics: Arc<RunMetrics>,
    ) -> Self {
        let (generation_tx, _) = crate::exec::generation_channel();
        Self {
            core,
            event_rx,
            executor,
            render_tx,
            cache,
            metrics,
            generation_tx,
            last_summary: None,
        }
    }

    /// Main event loop. Returns the summary of the last completed run.
    ///
    /// Dropping the coordinator closes the generation channel, which cancels
    /// whatever is still executing.
    pub async fn run(mut self) -> Result<Option<RunSummary>> {
        info!("coordinator started");

        loop {
            let Some(event) = self.event_rx.recv().await else {
                info!("coordinator event channel closed; exiting");
                break;
            };

            match &event {
                CoordinatorEvent::Execution(msg) => {
                    debug!(generation = %msg.generation, target = %msg.target.path.display(), "execution message");
                }
                other => debug!(event = ?other, "coordinator received event"),
            }

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping coordinator");
                break;
            }
        }

        Ok(self.last_summary)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::InvalidateCache(paths) => {
                if let Some(cache) = &self.cache {
                    let evicted: usize = paths.iter().map(|p| cache.invalidate(p)).sum();
                    debug!(paths = paths.len(), evicted, "invalidated cache entries");
                }
            }
            CoreCommand::Supersede { stale, next } => {
                self.generation_tx.send_replace(next);
                self.metrics.record_superseded();
                debug!(stale = %stale, next = %next, "cancellation signalled");
            }
            CoreCommand::Dispatch(request) => self.dispatch(request).await?,
            CoreCommand::Render(event) => {
                if self.render_tx.send(event).await.is_err() {
                    debug!("renderer gone; dropping render event");
                }
            }
            CoreCommand::CompleteRun(summary) => {
                self.metrics.record_completion(&summary);
                self.last_summary = Some(summary);
            }
            CoreCommand::RequestExit => {
                info!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    async fn dispatch(&mut self, request: RunRequest) -> Result<()> {
        let generation = request.generation;
        self.generation_tx.send_replace(generation);
        self.metrics.record_dispatch(request.targets.len());

        let names: Vec<_> = request
            .targets
            .iter()
            .map(|t| t.path.display().to_string())
            .collect();
        debug!(generation = %generation, ?names, "dispatching run");

        let cancel = CancelSignal::new(generation, self.generation_tx.subscribe());
        self.executor.dispatch(request, cancel).await
    }
}

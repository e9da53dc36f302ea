// src/coordinator/core.rs

//! Pure coordinator state machine.
//!
//! `CoreCoordinator` consumes [`CoordinatorEvent`]s and returns the commands
//! the async shell should execute. It owns no channels and spawns nothing;
//! the only IO it performs goes through the injected
//! [`FileSystem`](crate::fs::FileSystem) while resolving targets.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::coordinator::aggregate::RunAggregator;
use crate::coordinator::handlers::{CoreCommand, CoreStep};
use crate::coordinator::resolve::{Resolution, TargetResolver};
use crate::coordinator::{CoordinatorEvent, CoordinatorOptions, CoordinatorPhase};
use crate::model::{ExecutionMessage, Generation, RunRequest};
use crate::render::RenderEvent;
use crate::watch::event::ChangeBatch;

#[derive(Debug)]
pub struct CoreCoordinator {
    resolver: TargetResolver,
    options: CoordinatorOptions,
    phase: CoordinatorPhase,
    /// Last generation handed out.
    generation: Generation,
    active: Option<RunAggregator>,
    /// Changes observed since the last settled batch.
    observed: usize,
}

impl CoreCoordinator {
    pub fn new(resolver: TargetResolver, options: CoordinatorOptions) -> Self {
        Self {
            resolver,
            options,
            phase: CoordinatorPhase::Idle,
            generation: Generation::default(),
            active: None,
            observed: 0,
        }
    }

    pub fn phase(&self) -> CoordinatorPhase {
        self.phase
    }

    /// Generation of the run in progress, if any.
    pub fn active_generation(&self) -> Option<Generation> {
        self.active.as_ref().map(RunAggregator::generation)
    }

    pub fn resolver(&self) -> &TargetResolver {
        &self.resolver
    }

    /// Handle one event, returning the commands for the shell.
    pub fn step(&mut self, event: CoordinatorEvent) -> CoreStep {
        match event {
            CoordinatorEvent::ChangeObserved(change) => {
                self.observed += 1;
                if self.phase == CoordinatorPhase::Idle {
                    self.phase = CoordinatorPhase::Debouncing;
                }
                debug!(path = %change.path.display(), kind = ?change.kind, "change observed");
                CoreStep::proceed(Vec::new())
            }
            CoordinatorEvent::BatchSettled(batch) => self.on_batch(batch),
            CoordinatorEvent::RunAllRequested => {
                self.phase = CoordinatorPhase::Resolving;
                let resolution = self.resolver.resolve_all();
                self.on_resolution(resolution, Vec::new())
            }
            CoordinatorEvent::Execution(msg) => self.on_execution(msg),
            CoordinatorEvent::RunFinished { generation } => self.on_run_finished(generation),
            CoordinatorEvent::ShutdownRequested => {
                info!(active = ?self.active_generation(), "shutdown requested");
                self.active = None;
                self.phase = CoordinatorPhase::Idle;
                CoreStep::exit(Vec::new())
            }
        }
    }

    fn on_batch(&mut self, batch: ChangeBatch) -> CoreStep {
        self.observed = 0;
        if batch.is_empty() {
            self.settle_phase();
            return CoreStep::proceed(Vec::new());
        }

        self.phase = CoordinatorPhase::Resolving;
        let paths: Vec<_> = batch.paths().cloned().collect();
        info!(changes = paths.len(), "change batch settled");

        let commands = vec![CoreCommand::InvalidateCache(paths)];
        let resolution = self.resolver.resolve(&batch);
        self.on_resolution(resolution, commands)
    }

    fn on_resolution(&mut self, resolution: Resolution, mut commands: Vec<CoreCommand>) -> CoreStep {
        for path in &resolution.unresolved {
            warn!(path = %path.display(), "changed file belongs to no known package");
            commands.push(CoreCommand::Render(RenderEvent::Warning(format!(
                "{} does not belong to any known package",
                path.display()
            ))));
        }
        for message in resolution.warnings {
            commands.push(CoreCommand::Render(RenderEvent::Warning(message)));
        }

        if resolution.targets.is_empty() {
            debug!("no targets affected; not starting a run");
            self.settle_phase();
            if self.options.exit_when_idle && self.active.is_none() {
                info!("nothing to run; exiting");
                return CoreStep::exit(commands);
            }
            return CoreStep::proceed(commands);
        }

        let next = self.generation.next();
        self.generation = next;

        if let Some(stale) = self.active.take() {
            info!(stale = %stale.generation(), next = %next, "superseding active run");
            commands.push(CoreCommand::Supersede {
                stale: stale.generation(),
                next,
            });
            commands.push(CoreCommand::Render(RenderEvent::RunSuperseded {
                generation: stale.generation(),
            }));
        }

        let targets = resolution.targets;
        info!(generation = %next, targets = targets.len(), mode = %self.resolver.mode(), "starting run");
        self.active = Some(RunAggregator::new(next, targets.len(), Utc::now()));
        self.phase = CoordinatorPhase::Running;

        commands.push(CoreCommand::Dispatch(RunRequest {
            targets,
            mode: self.resolver.mode(),
            generation: next,
        }));
        CoreStep::proceed(commands)
    }

    fn on_execution(&mut self, msg: ExecutionMessage) -> CoreStep {
        let Some(active) = self.active.as_mut().filter(|a| a.generation() == msg.generation) else {
            debug!(
                generation = %msg.generation,
                target = %msg.target.path.display(),
                "dropping message from stale generation"
            );
            return CoreStep::proceed(Vec::new());
        };
        active.record(&msg);
        CoreStep::proceed(vec![CoreCommand::Render(RenderEvent::from(msg))])
    }

    fn on_run_finished(&mut self, generation: Generation) -> CoreStep {
        if self.active_generation() != Some(generation) {
            debug!(generation = %generation, "ignoring completion of stale generation");
            return CoreStep::proceed(Vec::new());
        }
        let Some(active) = self.active.take() else {
            return CoreStep::proceed(Vec::new());
        };

        let outstanding = active.outstanding();
        if outstanding > 0 {
            warn!(generation = %generation, outstanding, "run finished with targets unreported");
        }
        let summary = active.finish(Utc::now());
        info!(
            generation = %generation,
            passed = summary.totals.passed,
            failed = summary.totals.failed,
            cache_hits = summary.cache_hits,
            "run complete"
        );
        self.settle_phase();

        let commands = vec![
            CoreCommand::Render(RenderEvent::RunComplete(summary.clone())),
            CoreCommand::CompleteRun(summary),
        ];
        if self.options.exit_when_idle {
            return CoreStep::exit(commands);
        }
        CoreStep::proceed(commands)
    }

    /// Phase to fall back to when no new run starts.
    fn settle_phase(&mut self) {
        self.phase = if self.active.is_some() {
            CoordinatorPhase::Running
        } else if self.observed > 0 {
            CoordinatorPhase::Debouncing
        } else {
            CoordinatorPhase::Idle
        };
    }
}

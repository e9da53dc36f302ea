// src/coordinator/handlers.rs

//! Commands produced by the core and the step type carrying them.

use std::path::PathBuf;

use crate::model::{Generation, RunRequest, RunSummary};
use crate::render::RenderEvent;

/// Side effect requested by the pure core, executed by the async shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Evict cached results depending on these paths.
    InvalidateCache(Vec<PathBuf>),
    /// Signal cancellation of `stale`; `next` becomes the active generation.
    Supersede { stale: Generation, next: Generation },
    Dispatch(RunRequest),
    Render(RenderEvent),
    /// A run finished; the shell keeps the summary and updates metrics.
    CompleteRun(RunSummary),
    RequestExit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    pub keep_running: bool,
}

impl CoreStep {
    pub fn proceed(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub fn exit(mut commands: Vec<CoreCommand>) -> Self {
        commands.push(CoreCommand::RequestExit);
        Self {
            commands,
            keep_running: false,
        }
    }

    pub fn has_dispatch(&self) -> bool {
        self.commands
            .iter()
            .any(|c| matches!(c, CoreCommand::Dispatch(_)))
    }

    /// The run request in this step, if any.
    pub fn dispatched(&self) -> Option<&RunRequest> {
        self.commands.iter().find_map(|c| match c {
            CoreCommand::Dispatch(request) => Some(request),
            _ => None,
        })
    }
}

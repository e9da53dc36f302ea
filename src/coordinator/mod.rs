// src/coordinator/mod.rs

//! Watch coordination.
//!
//! The coordinator decides *what* to run when the tree changes:
//! - resolves settled change batches to test targets (`resolve`)
//! - supersedes the active run when a newer one starts
//! - drops results belonging to stale generations
//! - folds execution messages into a [`RunSummary`](crate::model::RunSummary) (`aggregate`)
//!
//! Semantics live in the synchronous [`core`]; the async shell in
//! [`runtime`] only moves events and commands between channels.

pub mod aggregate;
pub mod core;
pub mod handlers;
pub mod resolve;
pub mod runtime;

use crate::model::{ExecutionMessage, Generation};
use crate::watch::event::{ChangeBatch, FileChangeEvent};

pub use aggregate::RunAggregator;
pub use core::CoreCoordinator;
pub use handlers::{CoreCommand, CoreStep};
pub use resolve::{Resolution, TargetResolver};
pub use runtime::Coordinator;

/// Events flowing into the coordinator from the watcher, the executor and signals.
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// A raw change was seen; a batch will follow once things settle.
    ChangeObserved(FileChangeEvent),
    BatchSettled(ChangeBatch),
    /// Run every known target (startup and `--once`).
    RunAllRequested,
    Execution(ExecutionMessage),
    /// Every message of `generation` has been delivered.
    RunFinished { generation: Generation },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorPhase {
    Idle,
    Debouncing,
    Resolving,
    Running,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinatorOptions {
    /// Exit once a run completes and nothing else is pending (`--once`).
    pub exit_when_idle: bool,
}

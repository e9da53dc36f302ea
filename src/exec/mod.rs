// src/exec/mod.rs

//! Test execution layer.
//!
//! - [`process`] runs the harness for one target and parses its output.
//! - [`pool`] bounds how many targets run at once.
//! - [`strategy`] defines the strategies (sequential, parallel, cached).
//! - [`engine`] picks one strategy for the session and streams run messages.
//! - [`cancel`] carries generation-based cancellation.
//! - [`backend`] is the seam the coordinator dispatches through.

pub mod backend;
pub mod cancel;
pub mod engine;
pub mod pool;
pub mod process;
pub mod strategy;

pub use backend::{ExecutionBackend, RealExecutionBackend};
pub use cancel::{CancelSignal, generation_channel};
pub use engine::ExecutionEngine;
pub use pool::WorkerPool;
pub use process::{HarnessCommand, ProcessRunner, TargetOutcome};
pub use strategy::{CachedStrategy, ExecutionStrategy, SequentialStrategy};

// src/render/mod.rs

//! Incremental terminal rendering of run progress.

pub mod format;
pub mod renderer;

use std::path::PathBuf;

use crate::model::{
    ExecutionError, ExecutionMessage, ExecutionUpdate, Generation, RunSummary, TestResult,
    TestSuite,
};

pub use renderer::{IncrementalRenderer, RenderOptions, SuitePhase, run_renderer};

/// Everything the renderer reacts to.
#[derive(Debug, Clone)]
pub enum RenderEvent {
    SuiteStarted {
        suite: PathBuf,
    },
    TestResult {
        suite: PathBuf,
        result: TestResult,
    },
    SuiteCompleted {
        suite: PathBuf,
        outcome: Result<TestSuite, ExecutionError>,
    },
    Warning(String),
    RunSuperseded {
        generation: Generation,
    },
    RunComplete(RunSummary),
}

impl From<ExecutionMessage> for RenderEvent {
    fn from(msg: ExecutionMessage) -> Self {
        let suite = msg.target.path.clone();
        match msg.update {
            ExecutionUpdate::SuiteStarted => RenderEvent::SuiteStarted { suite },
            ExecutionUpdate::TestFinished(result) => RenderEvent::TestResult { suite, result },
            ExecutionUpdate::SuiteFinished(outcome) => RenderEvent::SuiteCompleted { suite, outcome },
        }
    }
}

// src/render/renderer.rs

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::model::{ExecutionError, RunSummary, TestResult, TestSuite, package_pattern};
use crate::render::RenderEvent;
use crate::render::format;

/// Lifecycle of one suite on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuitePhase {
    /// Events arrived but the suite has not started yet; they are buffered.
    Pending,
    Rendering,
    Settled,
}

#[derive(Debug)]
struct SuiteState {
    phase: SuitePhase,
    buffered: Vec<RenderEvent>,
}

impl SuiteState {
    fn pending() -> Self {
        Self {
            phase: SuitePhase::Pending,
            buffered: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Print each test result as it arrives.
    pub verbose: bool,
}

/// Turns pipeline events into terminal lines.
///
/// Output depends only on the events fed in; every line produced is also
/// kept in [`IncrementalRenderer::rendered`].
#[derive(Debug, Default)]
pub struct IncrementalRenderer {
    options: RenderOptions,
    suites: HashMap<PathBuf, SuiteState>,
    rendered: Vec<String>,
}

impl IncrementalRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn rendered(&self) -> &[String] {
        &self.rendered
    }

    pub fn phase_of(&self, suite: &Path) -> Option<SuitePhase> {
        self.suites.get(suite).map(|s| s.phase)
    }

    pub fn handle(&mut self, event: RenderEvent) -> Vec<String> {
        let lines = self.apply(event);
        self.record(lines)
    }

    pub fn on_suite_start(&mut self, suite: &Path) -> Vec<String> {
        let lines = self.start(suite);
        self.record(lines)
    }

    pub fn on_test_result(&mut self, suite: &Path, result: TestResult) -> Vec<String> {
        let lines = self.test_result(suite, result);
        self.record(lines)
    }

    pub fn on_suite_complete(
        &mut self,
        suite: &Path,
        outcome: Result<TestSuite, ExecutionError>,
    ) -> Vec<String> {
        let lines = self.complete(suite, outcome);
        self.record(lines)
    }

    pub fn on_run_complete(&mut self, summary: &RunSummary) -> Vec<String> {
        let lines = self.run_complete(summary);
        self.record(lines)
    }

    fn record(&mut self, lines: Vec<String>) -> Vec<String> {
        self.rendered.extend(lines.iter().cloned());
        lines
    }

    fn apply(&mut self, event: RenderEvent) -> Vec<String> {
        match event {
            RenderEvent::SuiteStarted { suite } => self.start(&suite),
            RenderEvent::TestResult { suite, result } => self.test_result(&suite, result),
            RenderEvent::SuiteCompleted { suite, outcome } => self.complete(&suite, outcome),
            RenderEvent::Warning(message) => vec![format::warning_line(&message)],
            RenderEvent::RunSuperseded { generation } => {
                self.suites.clear();
                vec![format!("↻ run {generation} superseded by newer changes")]
            }
            RenderEvent::RunComplete(summary) => self.run_complete(&summary),
        }
    }

    fn state(&mut self, suite: &Path) -> &mut SuiteState {
        self.suites
            .entry(suite.to_path_buf())
            .or_insert_with(SuiteState::pending)
    }

    fn start(&mut self, suite: &Path) -> Vec<String> {
        let verbose = self.options.verbose;
        let state = self.state(suite);
        if state.phase != SuitePhase::Pending {
            debug!(suite = %suite.display(), phase = ?state.phase, "duplicate suite start ignored");
            return Vec::new();
        }
        state.phase = SuitePhase::Rendering;
        let buffered = std::mem::take(&mut state.buffered);

        let mut lines = Vec::new();
        if verbose {
            lines.push(format::suite_running_line(suite));
        }
        for event in buffered {
            lines.extend(self.apply(event));
        }
        lines
    }

    fn test_result(&mut self, suite: &Path, result: TestResult) -> Vec<String> {
        let verbose = self.options.verbose;
        let state = self.state(suite);
        match state.phase {
            SuitePhase::Pending => {
                state.buffered.push(RenderEvent::TestResult {
                    suite: suite.to_path_buf(),
                    result,
                });
                Vec::new()
            }
            SuitePhase::Rendering => verbose
                .then(|| format::test_line(&result))
                .into_iter()
                .collect(),
            SuitePhase::Settled => {
                debug!(suite = %suite.display(), test = %result.name, "result after suite settled ignored");
                Vec::new()
            }
        }
    }

    fn complete(&mut self, suite: &Path, outcome: Result<TestSuite, ExecutionError>) -> Vec<String> {
        let state = self.state(suite);
        match state.phase {
            SuitePhase::Pending => {
                state.buffered.push(RenderEvent::SuiteCompleted {
                    suite: suite.to_path_buf(),
                    outcome,
                });
                Vec::new()
            }
            SuitePhase::Rendering => {
                state.phase = SuitePhase::Settled;
                match outcome {
                    Ok(done) if done.has_failures() => format::expanded_suite(&done),
                    Ok(done) => vec![format::collapsed_suite(&done)],
                    Err(error) => format::execution_error_lines(suite, &error),
                }
            }
            SuitePhase::Settled => {
                debug!(suite = %suite.display(), "duplicate suite completion ignored");
                Vec::new()
            }
        }
    }

    fn run_complete(&mut self, summary: &RunSummary) -> Vec<String> {
        let mut unsettled: Vec<PathBuf> = self
            .suites
            .drain()
            .filter(|(_, s)| s.phase != SuitePhase::Settled)
            .map(|(path, _)| path)
            .collect();
        unsettled.sort();
        if !unsettled.is_empty() {
            warn!(unsettled = unsettled.len(), "run completed with unsettled suites");
        }

        let mut lines: Vec<String> = unsettled
            .iter()
            .map(|path| {
                format::warning_line(&format!(
                    "{} did not report before the run completed",
                    package_pattern(path)
                ))
            })
            .collect();
        lines.extend(format::summary_lines(summary));
        lines
    }
}

/// Drive `renderer` from `rx`, writing every produced line to `out`.
///
/// Returns the renderer once the channel closes.
pub async fn run_renderer<W: Write + Send + 'static>(
    mut renderer: IncrementalRenderer,
    mut rx: mpsc::Receiver<RenderEvent>,
    mut out: W,
) -> IncrementalRenderer {
    while let Some(event) = rx.recv().await {
        let lines = renderer.handle(event);
        if lines.is_empty() {
            continue;
        }
        for line in &lines {
            if let Err(e) = writeln!(out, "{line}") {
                warn!(error = %e, "failed to write rendered output");
            }
        }
        if let Err(e) = out.flush() {
            warn!(error = %e, "failed to flush rendered output");
        }
    }
    debug!(lines = renderer.rendered().len(), "renderer finished");
    renderer
}

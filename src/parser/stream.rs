// src/parser/stream.rs

//! Incremental parser turning one target's `go test -json` stream into
//! [`TestResult`]s and, at the end, a [`TestSuite`].

use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::model::{
    ErrorKind, ParseWarning, SourceContext, SuiteError, TestError, TestResult, TestStatus,
    TestSuite,
};
use crate::parser::event::{TestAction, TestEvent};
use crate::parser::location::{self, Location};
use crate::parser::source::{extract_context, resolve_source_path};

const GO_TIMEOUT_PANIC: &str = "panic: test timed out";

/// How the producing process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Completed,
    /// Killed after exceeding its timeout.
    TimedOut,
}

#[derive(Debug, Default)]
struct InFlight {
    started_at: Option<DateTime<FixedOffset>>,
    output: Vec<String>,
    order: usize,
}

#[derive(Debug)]
pub struct EventStreamParser {
    package_dir: PathBuf,
    source_dir: PathBuf,
    fs: Arc<dyn FileSystem>,
    context_lines: usize,

    in_flight: HashMap<String, InFlight>,
    started: usize,
    results: Vec<TestResult>,

    package_output: Vec<String>,
    /// Unstructured lines with the stdout line they came from (`0` for stderr).
    raw_output: Vec<(usize, String)>,
    build_failed: bool,
    package_action: Option<TestAction>,
    package_elapsed: Option<Duration>,
    first_time: Option<DateTime<FixedOffset>>,
    last_time: Option<DateTime<FixedOffset>>,

    warnings: Vec<ParseWarning>,
    line_no: usize,
}

impl EventStreamParser {
    /// `package_dir` names the suite and is where relative file names in
    /// failure output are looked up.
    pub fn new(package_dir: impl Into<PathBuf>, fs: Arc<dyn FileSystem>, context_lines: usize) -> Self {
        let package_dir = package_dir.into();
        Self {
            source_dir: package_dir.clone(),
            package_dir,
            fs,
            context_lines,
            in_flight: HashMap::new(),
            started: 0,
            results: Vec::new(),
            package_output: Vec::new(),
            raw_output: Vec::new(),
            build_failed: false,
            package_action: None,
            package_elapsed: None,
            first_time: None,
            last_time: None,
            warnings: Vec::new(),
            line_no: 0,
        }
    }

    /// Resolve source files against `root/<package_dir>` instead of the
    /// (relative) package dir itself.
    pub fn with_source_root(mut self, root: &Path) -> Self {
        self.source_dir = root.join(&self.package_dir);
        self
    }

    /// Consume one stdout line; returns a result as soon as a test completes.
    pub fn feed_line(&mut self, line: &str) -> Option<TestResult> {
        self.line_no += 1;
        let line = line.trim_end_matches(['\r', '\n']);
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            return None;
        }

        if !trimmed.starts_with('{') {
            self.raw_output.push((self.line_no, line.to_string()));
            return None;
        }

        match TestEvent::decode(trimmed) {
            Ok(event) => self.apply(event),
            Err(e) => {
                let warning = ParseWarning {
                    line: self.line_no,
                    message: format!("malformed event: {e}"),
                };
                warn!(package = %self.package_dir.display(), line = warning.line, error = %e, "skipping malformed event");
                self.warnings.push(warning);
                None
            }
        }
    }

    /// Consume one line of unstructured output (stderr).
    pub fn feed_raw(&mut self, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);
        if !line.trim().is_empty() {
            self.raw_output.push((0, line.to_string()));
        }
    }

    /// Results completed so far, in completion order.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    fn apply(&mut self, event: TestEvent) -> Option<TestResult> {
        if let Some(t) = event.time {
            self.first_time.get_or_insert(t);
            self.last_time = Some(t);
        }

        let Some(name) = event.test.clone() else {
            self.apply_package_event(&event);
            return None;
        };

        match event.action {
            TestAction::Run => {
                self.track(&name, event.time);
                None
            }
            TestAction::Pause | TestAction::Cont => {
                self.track(&name, None);
                None
            }
            TestAction::Output => {
                let lines = split_output(event.output.as_deref());
                self.track(&name, None).output.extend(lines);
                None
            }
            TestAction::Pass | TestAction::Fail | TestAction::Skip => {
                Some(self.complete(name, &event))
            }
            TestAction::Start | TestAction::Bench | TestAction::BuildOutput | TestAction::BuildFail => {
                None
            }
        }
    }

    fn apply_package_event(&mut self, event: &TestEvent) {
        match event.action {
            TestAction::Output => self.package_output.extend(split_output(event.output.as_deref())),
            TestAction::BuildOutput => {
                let line_no = self.line_no;
                self.raw_output
                    .extend(split_output(event.output.as_deref()).into_iter().map(|l| (line_no, l)));
            }
            TestAction::BuildFail => self.build_failed = true,
            TestAction::Pass | TestAction::Fail | TestAction::Skip => {
                self.package_action = Some(event.action);
                self.package_elapsed = self.elapsed(event.elapsed);
            }
            _ => {}
        }
    }

    fn track(&mut self, name: &str, started_at: Option<DateTime<FixedOffset>>) -> &mut InFlight {
        let order = self.started;
        let flight = self.in_flight.entry(name.to_string()).or_insert_with(|| InFlight {
            started_at: None,
            output: Vec::new(),
            order,
        });
        if flight.order == order {
            self.started += 1;
        }
        if flight.started_at.is_none() {
            flight.started_at = started_at;
        }
        flight
    }

    fn complete(&mut self, name: String, event: &TestEvent) -> TestResult {
        let flight = self.in_flight.remove(&name).unwrap_or_default();

        let elapsed = self
            .elapsed(event.elapsed)
            .or_else(|| span(flight.started_at, event.time))
            .unwrap_or(Duration::ZERO);

        let mut status = match event.action {
            TestAction::Pass => TestStatus::Passed,
            TestAction::Skip => TestStatus::Skipped,
            _ => TestStatus::Failed,
        };

        let error = if status == TestStatus::Failed {
            let err = self.build_error(&flight.output);
            if err.kind == ErrorKind::Timeout {
                status = TestStatus::TimedOut;
            }
            Some(err)
        } else {
            None
        };

        let result = TestResult {
            parent: parent_name(&name),
            name,
            status,
            elapsed,
            output: flight.output,
            error,
        };
        self.results.push(result.clone());
        result
    }

    /// Convert a reported `Elapsed`; values no `Duration` can hold cost a warning.
    fn elapsed(&mut self, secs: Option<f64>) -> Option<Duration> {
        let secs = secs?;
        match Duration::try_from_secs_f64(secs) {
            Ok(d) => Some(d),
            Err(e) => {
                warn!(package = %self.package_dir.display(), line = self.line_no, elapsed = secs, "ignoring unusable elapsed time");
                self.warnings.push(ParseWarning {
                    line: self.line_no,
                    message: format!("unusable elapsed time {secs}: {e}"),
                });
                None
            }
        }
    }

    /// Classify a failure from the test's own output.
    fn build_error(&self, output: &[String]) -> TestError {
        let relevant: Vec<String> = output.iter().filter(|l| !is_framing(l)).cloned().collect();

        if let Some(idx) = relevant.iter().position(|l| l.contains(GO_TIMEOUT_PANIC)) {
            let frame = location::find_panic_frame(&relevant[idx..]);
            return self.error_at(relevant[idx].trim().to_string(), ErrorKind::Timeout, frame);
        }

        if let Some(idx) = relevant.iter().position(|l| l.trim_start().starts_with("panic:")) {
            let frame = location::find_panic_frame(&relevant[idx..]);
            return self.error_at(relevant[idx].trim().to_string(), ErrorKind::Panic, frame);
        }

        if let Some(report) = location::find_report(&relevant) {
            let mut message = report.message.clone();
            for extra in relevant[report.index + 1..]
                .iter()
                .take_while(|l| l.starts_with("        ") || l.starts_with('\t'))
            {
                message.push('\n');
                message.push_str(extra.trim());
            }
            return self.error_at(message, ErrorKind::Assertion, Some(report));
        }

        let message = relevant
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .unwrap_or("test failed")
            .to_string();
        self.error_at(message, ErrorKind::Failure, None)
    }

    fn error_at(&self, message: String, kind: ErrorKind, at: Option<Location>) -> TestError {
        let Some(at) = at else {
            return TestError {
                message,
                kind,
                file: None,
                line: None,
                source_context: SourceContext::unavailable(),
            };
        };

        let path = resolve_source_path(&self.source_dir, &at.file);
        let source_context = extract_context(self.fs.as_ref(), &path, at.line, self.context_lines);
        TestError {
            message,
            kind,
            file: Some(at.file),
            line: Some(at.line),
            source_context,
        }
    }

    /// Close the stream and assemble the suite.
    pub fn finish(mut self, end: StreamEnd) -> TestSuite {
        let go_timed_out = self.package_output.iter().any(|l| l.contains(GO_TIMEOUT_PANIC));
        let timed_out = end == StreamEnd::TimedOut || go_timed_out;

        let mut unfinished: Vec<(String, InFlight)> = self.in_flight.drain().collect();
        unfinished.sort_by_key(|(_, f)| f.order);

        for (name, flight) in unfinished {
            let elapsed = span(flight.started_at, self.last_time).unwrap_or(Duration::ZERO);
            let (status, error) = if timed_out {
                let error = TestError {
                    message: "test did not finish before the timeout".to_string(),
                    kind: ErrorKind::Timeout,
                    file: None,
                    line: None,
                    source_context: SourceContext::unavailable(),
                };
                (TestStatus::TimedOut, error)
            } else {
                let mut combined = flight.output.clone();
                combined.extend(self.package_output.iter().cloned());
                let mut error = self.build_error(&combined);
                match error.kind {
                    ErrorKind::Timeout => (TestStatus::TimedOut, error),
                    ErrorKind::Failure => {
                        error.message = "test did not complete".to_string();
                        (TestStatus::Failed, error)
                    }
                    _ => (TestStatus::Failed, error),
                }
            };
            debug!(package = %self.package_dir.display(), test = %name, ?status, "test unfinished at end of stream");
            self.results.push(TestResult {
                parent: parent_name(&name),
                name,
                status,
                elapsed,
                output: flight.output,
                error: Some(error),
            });
        }

        let any_test_failed = self.results.iter().any(|r| r.status.is_failure());
        let package_failed = self.package_action == Some(TestAction::Fail);
        let package_passed = self.package_action == Some(TestAction::Pass);

        // Only a stream without any test events can be explained by a build failure.
        let error = if self.build_failed
            || (!self.raw_output.is_empty() && !package_passed && self.results.is_empty())
        {
            let output = if self.raw_output.is_empty() {
                std::mem::take(&mut self.package_output)
            } else {
                std::mem::take(&mut self.raw_output).into_iter().map(|(_, l)| l).collect()
            };
            Some(SuiteError::Build { output })
        } else if package_failed && !any_test_failed {
            Some(SuiteError::PackageFailed {
                output: std::mem::take(&mut self.package_output),
            })
        } else {
            None
        };

        if !self.raw_output.is_empty() {
            warn!(package = %self.package_dir.display(), lines = self.raw_output.len(), "unstructured output outside any test");
            for (line, text) in std::mem::take(&mut self.raw_output) {
                self.warnings.push(ParseWarning {
                    line,
                    message: format!("unstructured output: {text}"),
                });
            }
        }

        let elapsed = self
            .package_elapsed
            .or_else(|| span(self.first_time, self.last_time))
            .unwrap_or(Duration::ZERO);

        TestSuite {
            file_path: self.package_dir,
            results: self.results,
            elapsed,
            heap_delta: None,
            error,
            warnings: self.warnings,
            from_cache: false,
        }
    }
}

/// Parse a complete stream in one go.
pub fn parse(
    reader: impl BufRead,
    package_dir: impl Into<PathBuf>,
    fs: Arc<dyn FileSystem>,
    context_lines: usize,
) -> std::io::Result<TestSuite> {
    let mut parser = EventStreamParser::new(package_dir, fs, context_lines);
    for line in reader.lines() {
        parser.feed_line(&line?);
    }
    Ok(parser.finish(StreamEnd::Completed))
}

fn split_output(output: Option<&str>) -> Vec<String> {
    output
        .unwrap_or_default()
        .trim_end_matches('\n')
        .split('\n')
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.trim_end_matches('\r').to_string())
        .collect()
}

fn is_framing(line: &str) -> bool {
    let t = line.trim_start();
    ["=== RUN", "=== PAUSE", "=== CONT", "=== NAME", "--- FAIL", "--- PASS", "--- SKIP"]
        .iter()
        .any(|p| t.starts_with(p))
}

fn parent_name(name: &str) -> Option<String> {
    name.rsplit_once('/').map(|(parent, _)| parent.to_string())
}

fn span(from: Option<DateTime<FixedOffset>>, to: Option<DateTime<FixedOffset>>) -> Option<Duration> {
    (to? - from?).to_std().ok()
}

// src/model.rs

//! Data that flows through the pipeline: run requests, parsed test results,
//! suites and run summaries.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::WatchMode;

/// Identifier of one run; strictly increasing over a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hex digest summarising a target's inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A runnable test package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTarget {
    /// Package directory relative to the project root (`.` for the root package).
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    /// Every file whose content feeds the fingerprint, relative to the project root.
    pub dependencies: Vec<PathBuf>,
}

impl TestTarget {
    /// The package pattern handed to the harness (`./pkg/foo`, or `.`).
    pub fn package_pattern(&self) -> String {
        package_pattern(&self.path)
    }
}

pub fn package_pattern(dir: &Path) -> String {
    let rel = dir.to_string_lossy().replace('\\', "/");
    if rel.is_empty() || rel == "." {
        ".".to_string()
    } else {
        format!("./{}", rel.trim_start_matches("./"))
    }
}

/// One unit of work handed to the execution engine.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub targets: Vec<TestTarget>,
    pub mode: WatchMode,
    pub generation: Generation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    TimedOut,
}

impl TestStatus {
    pub fn is_failure(self) -> bool {
        matches!(self, TestStatus::Failed | TestStatus::TimedOut)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// `t.Error`/`t.Fatal` style failure with a reported location.
    Assertion,
    Panic,
    Timeout,
    /// Anything else that made the test fail.
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
    pub is_error_line: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceContext {
    Lines(Vec<SourceLine>),
    Unavailable(String),
}

impl SourceContext {
    pub fn unavailable() -> Self {
        SourceContext::Unavailable("source unavailable".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestError {
    pub message: String,
    pub kind: ErrorKind,
    pub file: Option<String>,
    pub line: Option<usize>,
    pub source_context: SourceContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    /// Enclosing test for subtests (`TestA/case_1` → `TestA`).
    pub parent: Option<String>,
    pub status: TestStatus,
    pub elapsed: Duration,
    pub output: Vec<String>,
    pub error: Option<TestError>,
}

/// A line of harness output that could not be attributed to a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// Stdout line number, `0` for stderr.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "stderr: {}", self.message)
        } else {
            write!(f, "line {}: {}", self.line, self.message)
        }
    }
}

/// Failure of a suite that is not attributable to a single test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuiteError {
    /// Unstructured output, typically a compile error.
    Build { output: Vec<String> },
    /// The package reported `fail` but no individual test failed.
    PackageFailed { output: Vec<String> },
    /// The harness exited non-zero without reporting any failure.
    ExitStatus { code: Option<i32> },
    /// The target was killed after its timeout with no test in flight.
    Timeout { after: Duration },
}

impl SuiteError {
    pub fn output(&self) -> &[String] {
        match self {
            SuiteError::Build { output } | SuiteError::PackageFailed { output } => output,
            SuiteError::ExitStatus { .. } | SuiteError::Timeout { .. } => &[],
        }
    }
}

impl fmt::Display for SuiteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuiteError::Build { .. } => f.write_str("build failed"),
            SuiteError::PackageFailed { .. } => f.write_str("package failed outside of any test"),
            SuiteError::ExitStatus { code: Some(code) } => {
                write!(f, "test command exited with status {code}")
            }
            SuiteError::ExitStatus { code: None } => {
                f.write_str("test command was terminated by a signal")
            }
            SuiteError::Timeout { after } => write!(f, "timed out after {}s", after.as_secs()),
        }
    }
}

/// Everything known about one executed (or replayed) target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSuite {
    pub file_path: PathBuf,
    pub results: Vec<TestResult>,
    pub elapsed: Duration,
    /// Not reported by `go test -json`; kept for harnesses that do.
    pub heap_delta: Option<i64>,
    pub error: Option<SuiteError>,
    pub warnings: Vec<ParseWarning>,
    #[serde(default)]
    pub from_cache: bool,
}

impl TestSuite {
    pub fn empty(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            results: Vec::new(),
            elapsed: Duration::ZERO,
            heap_delta: None,
            error: None,
            warnings: Vec::new(),
            from_cache: false,
        }
    }

    pub fn count(&self, status: TestStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn passed(&self) -> usize {
        self.count(TestStatus::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(TestStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(TestStatus::Skipped)
    }

    pub fn timed_out(&self) -> usize {
        self.count(TestStatus::TimedOut)
    }

    pub fn has_failures(&self) -> bool {
        self.error.is_some() || self.results.iter().any(|r| r.status.is_failure())
    }

    /// Only clean suites are worth replaying later.
    pub fn is_cacheable(&self) -> bool {
        !self.from_cache && !self.has_failures()
    }
}

/// Why a target produced no suite at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    Spawn(String),
    Io(String),
    /// The task running the target died before reporting.
    Worker(String),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::Spawn(msg) => write!(f, "failed to start test command: {msg}"),
            ExecutionError::Io(msg) => write!(f, "failed to read test output: {msg}"),
            ExecutionError::Worker(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ExecutionError {}

/// Progress of one target within a run.
#[derive(Debug, Clone)]
pub enum ExecutionUpdate {
    SuiteStarted,
    TestFinished(TestResult),
    SuiteFinished(Result<TestSuite, ExecutionError>),
}

/// An [`ExecutionUpdate`] tagged with the run and target it belongs to.
#[derive(Debug, Clone)]
pub struct ExecutionMessage {
    pub generation: Generation,
    pub target: Arc<TestTarget>,
    pub update: ExecutionUpdate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub timed_out: usize,
    /// Suites carrying a suite-level error or an execution error.
    pub errored_suites: usize,
}

impl Totals {
    pub fn tests(&self) -> usize {
        self.passed + self.failed + self.skipped + self.timed_out
    }
}

/// Outcome of one generation, handed to the renderer as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub generation: Generation,
    /// Sorted by `file_path`.
    pub suites: Vec<TestSuite>,
    pub execution_errors: Vec<(PathBuf, ExecutionError)>,
    pub totals: Totals,
    pub cache_hits: usize,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.totals.failed == 0 && self.totals.timed_out == 0 && self.totals.errored_suites == 0
    }

    pub fn duration(&self) -> Duration {
        (self.ended_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn failed_suites(&self) -> usize {
        self.suites.iter().filter(|s| s.has_failures()).count() + self.execution_errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_pattern_prefixes_relative_dirs() {
        assert_eq!(package_pattern(Path::new(".")), ".");
        assert_eq!(package_pattern(Path::new("")), ".");
        assert_eq!(package_pattern(Path::new("pkg/store")), "./pkg/store");
        assert_eq!(package_pattern(Path::new("./cmd")), "./cmd");
    }
}

// src/render/format.rs

//! Pure line formatting for suites, failures and run summaries.

use std::path::Path;
use std::time::Duration;

use crate::model::{
    ExecutionError, RunSummary, SourceContext, SuiteError, TestError, TestResult, TestStatus,
    TestSuite, package_pattern,
};

/// Prefix of every per-failure error block header.
pub const ERROR_BLOCK_MARKER: &str = "  ● ";

pub fn status_icon(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Passed => "✓",
        TestStatus::Failed => "✗",
        TestStatus::Skipped => "↓",
        TestStatus::TimedOut => "⏱",
    }
}

pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn suite_label(path: &Path) -> String {
    package_pattern(path)
}

pub fn suite_running_line(path: &Path) -> String {
    format!(" RUNS {}", suite_label(path))
}

/// Streaming line for one test (verbose mode).
pub fn test_line(result: &TestResult) -> String {
    format!(
        "    {} {} {}",
        status_icon(result.status),
        result.name,
        format_duration(result.elapsed)
    )
}

fn cache_tag(suite: &TestSuite) -> &'static str {
    if suite.from_cache { " (cached)" } else { "" }
}

/// One-line rendering of a suite without failures.
pub fn collapsed_suite(suite: &TestSuite) -> String {
    let mut counts = plural(suite.results.len(), "test");
    if suite.skipped() > 0 {
        counts.push_str(&format!(" | {} skipped", suite.skipped()));
    }
    format!(
        "✓ {} ({}) {}{}",
        suite_label(&suite.file_path),
        counts,
        format_duration(suite.elapsed),
        cache_tag(suite)
    )
}

/// Full rendering of a suite with failures: header, every test, then one
/// error block per failing test and the suite error if any.
pub fn expanded_suite(suite: &TestSuite) -> Vec<String> {
    let failing = suite.failed() + suite.timed_out();
    let mut counts = plural(suite.results.len(), "test");
    if failing > 0 {
        counts.push_str(&format!(" | {failing} failed"));
    }

    let mut lines = vec![format!(
        "✗ {} ({}) {}{}",
        suite_label(&suite.file_path),
        counts,
        format_duration(suite.elapsed),
        cache_tag(suite)
    )];

    for result in &suite.results {
        lines.push(format!(
            "    {} {} {}",
            status_icon(result.status),
            result.name,
            format_duration(result.elapsed)
        ));
    }

    for result in suite.results.iter().filter(|r| r.status.is_failure()) {
        lines.push(String::new());
        lines.extend(error_block(result));
    }

    if let Some(error) = &suite.error {
        lines.push(String::new());
        lines.extend(suite_error_block(error));
    }

    for warning in &suite.warnings {
        lines.push(format!("  ⚠ {warning}"));
    }

    lines
}

pub fn error_block(result: &TestResult) -> Vec<String> {
    let mut lines = vec![format!("{ERROR_BLOCK_MARKER}{}", result.name)];
    match &result.error {
        Some(error) => lines.extend(error_details(error)),
        None => lines.push("    test failed".to_string()),
    }
    lines
}

fn error_details(error: &TestError) -> Vec<String> {
    let mut lines: Vec<String> = error.message.lines().map(|l| format!("    {l}")).collect();

    if let (Some(file), Some(line)) = (&error.file, error.line) {
        lines.push(format!("    at {file}:{line}"));
    }

    match &error.source_context {
        SourceContext::Lines(source) => {
            let width = source
                .iter()
                .map(|l| l.number.to_string().len())
                .max()
                .unwrap_or(1);
            for l in source {
                let marker = if l.is_error_line { ">" } else { " " };
                lines.push(format!("    {marker} {:>width$} | {}", l.number, l.text));
            }
        }
        SourceContext::Unavailable(reason) => lines.push(format!("    ({reason})")),
    }
    lines
}

pub fn suite_error_block(error: &SuiteError) -> Vec<String> {
    let mut lines = vec![format!("  ✗ {error}")];
    lines.extend(error.output().iter().map(|l| format!("    {l}")));
    lines
}

pub fn execution_error_lines(path: &Path, error: &ExecutionError) -> Vec<String> {
    vec![format!("✗ {} {error}", suite_label(path))]
}

pub fn warning_line(message: &str) -> String {
    format!("⚠ {message}")
}

/// Summary block printed when a run completes.
pub fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let t = &summary.totals;
    let failed_files = summary.failed_suites();
    let total_files = summary.suites.len() + summary.execution_errors.len();
    let passed_files = total_files.saturating_sub(failed_files);

    let mut files = Vec::new();
    if passed_files > 0 {
        files.push(format!("{passed_files} passed"));
    }
    if failed_files > 0 {
        files.push(format!("{failed_files} failed"));
    }

    let mut tests = Vec::new();
    if t.passed > 0 {
        tests.push(format!("{} passed", t.passed));
    }
    if t.failed > 0 {
        tests.push(format!("{} failed", t.failed));
    }
    if t.timed_out > 0 {
        tests.push(format!("{} timed out", t.timed_out));
    }
    if t.skipped > 0 {
        tests.push(format!("{} skipped", t.skipped));
    }

    let mut lines = vec![
        String::new(),
        format!(" Test Files  {} ({total_files})", join_or_none(&files)),
        format!("      Tests  {} ({})", join_or_none(&tests), t.tests()),
    ];
    if summary.cache_hits > 0 {
        lines.push(format!("      Cache  {}", plural(summary.cache_hits, "hit")));
    }
    lines.push(format!("   Duration  {}", format_duration(summary.duration())));
    lines
}

fn join_or_none(parts: &[String]) -> String {
    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(" | ")
    }
}

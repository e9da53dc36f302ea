// src/parser/location.rs

//! Locating the failing source line in test output.

use std::sync::LazyLock;

use regex::Regex;

/// `    store_test.go:42: want 3, got 4` as printed by `t.Errorf`.
static REPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([\w./\\-]+\.go):(\d+):\s?(.*)$").expect("report location regex is valid")
});

/// `	/home/me/app/pkg/store_test.go:42 +0x1d` in a goroutine trace.
static FRAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+(\S+\.go):(\d+)(?:\s+\+0x[0-9a-f]+)?\s*$").expect("frame regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: usize,
    /// Text after `file:line:`; empty for stack frames.
    pub message: String,
    /// Index of the output line the location was found on.
    pub index: usize,
}

/// First `file:line: message` report in `lines`.
pub fn find_report(lines: &[String]) -> Option<Location> {
    lines.iter().enumerate().find_map(|(index, line)| {
        let caps = REPORT_RE.captures(line)?;
        Some(Location {
            file: caps.get(1)?.as_str().to_string(),
            line: caps.get(2)?.as_str().parse().ok()?,
            message: caps.get(3).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
            index,
        })
    })
}

/// First stack frame in `lines` that is not inside the Go runtime or the
/// `testing` package.
pub fn find_panic_frame(lines: &[String]) -> Option<Location> {
    lines.iter().enumerate().find_map(|(index, line)| {
        let caps = FRAME_RE.captures(line)?;
        let file = caps.get(1)?.as_str();
        if is_runtime_frame(file) {
            return None;
        }
        Some(Location {
            file: file.to_string(),
            line: caps.get(2)?.as_str().parse().ok()?,
            message: String::new(),
            index,
        })
    })
}

fn is_runtime_frame(file: &str) -> bool {
    let normalised = file.replace('\\', "/");
    normalised.contains("/src/runtime/") || normalised.contains("/src/testing/")
}

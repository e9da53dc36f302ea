// src/parser/event.rs

//! One record of the `go test -json` wire format.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestAction {
    Start,
    Run,
    Pause,
    Cont,
    Output,
    Pass,
    Fail,
    Skip,
    Bench,
    /// Compiler output for the package (Go 1.24+).
    #[serde(rename = "build-output")]
    BuildOutput,
    #[serde(rename = "build-fail")]
    BuildFail,
}

/// Field names are PascalCase on the wire; lowercase is accepted too.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TestEvent {
    #[serde(rename = "Time", alias = "time", default)]
    pub time: Option<DateTime<FixedOffset>>,

    #[serde(rename = "Action", alias = "action")]
    pub action: TestAction,

    #[serde(rename = "Package", alias = "package", default)]
    pub package: String,

    #[serde(rename = "Test", alias = "test", default)]
    pub test: Option<String>,

    /// Seconds.
    #[serde(rename = "Elapsed", alias = "elapsed", default)]
    pub elapsed: Option<f64>,

    #[serde(rename = "Output", alias = "output", default)]
    pub output: Option<String>,
}

impl TestEvent {
    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wire_record() {
        let ev = TestEvent::decode(
            r#"{"Time":"2024-05-01T10:00:00.5+02:00","Action":"pass","Package":"example.com/app/pkg","Test":"TestAdd","Elapsed":0.25}"#,
        )
        .unwrap();
        assert_eq!(ev.action, TestAction::Pass);
        assert_eq!(ev.test.as_deref(), Some("TestAdd"));
        assert_eq!(ev.elapsed, Some(0.25));
        assert!(ev.time.is_some());
    }

    #[test]
    fn accepts_lowercase_fields_and_build_actions() {
        let ev = TestEvent::decode(r#"{"action":"build-fail","package":"p"}"#).unwrap();
        assert_eq!(ev.action, TestAction::BuildFail);
        assert!(TestEvent::decode(r#"{"Action":"explode"}"#).is_err());
    }
}

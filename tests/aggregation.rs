// tests/aggregation.rs

mod common;
use crate::common::fake_backend::passing_suite;
use crate::common::init_tracing;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use sentinel::coordinator::RunAggregator;
use sentinel::model::{
    ExecutionError, ExecutionMessage, ExecutionUpdate, Fingerprint, Generation, SuiteError,
    TestResult, TestStatus, TestSuite, TestTarget,
};

fn message(generation: Generation, path: &str, update: ExecutionUpdate) -> ExecutionMessage {
    ExecutionMessage {
        generation,
        target: Arc::new(TestTarget {
            path: PathBuf::from(path),
            fingerprint: Fingerprint(format!("fp-{path}")),
            dependencies: Vec::new(),
        }),
        update,
    }
}

fn finished(path: &str, suite: TestSuite) -> ExecutionMessage {
    message(Generation(1), path, ExecutionUpdate::SuiteFinished(Ok(suite)))
}

fn result(name: &str, status: TestStatus) -> TestResult {
    TestResult {
        name: name.to_string(),
        parent: None,
        status,
        elapsed: Duration::from_millis(1),
        output: Vec::new(),
        error: None,
    }
}

fn mixed_suite(path: &str) -> TestSuite {
    let mut suite = TestSuite::empty(path);
    suite.results = vec![
        result("TestA", TestStatus::Passed),
        result("TestB", TestStatus::Failed),
        result("TestC", TestStatus::Skipped),
        result("TestD", TestStatus::TimedOut),
    ];
    suite
}

#[test]
fn totals_cover_every_status_and_error_kind() {
    init_tracing();
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).single().expect("valid time");
    let mut aggregator = RunAggregator::new(Generation(1), 4, start);

    let mut cached = passing_suite("cache");
    cached.from_cache = true;
    let mut broken = TestSuite::empty("broken");
    broken.error = Some(SuiteError::Build {
        output: vec!["syntax error".to_string()],
    });

    aggregator.record(&finished("mixed", mixed_suite("mixed")));
    aggregator.record(&finished("cache", cached));
    aggregator.record(&finished("broken", broken));
    assert_eq!(aggregator.outstanding(), 1);
    aggregator.record(&message(
        Generation(1),
        "gone",
        ExecutionUpdate::SuiteFinished(Err(ExecutionError::Spawn("sh missing".to_string()))),
    ));
    assert_eq!(aggregator.outstanding(), 0);

    let summary = aggregator.finish(start + chrono::Duration::seconds(2));

    assert_eq!(summary.totals.passed, 2);
    assert_eq!(summary.totals.failed, 1);
    assert_eq!(summary.totals.skipped, 1);
    assert_eq!(summary.totals.timed_out, 1);
    assert_eq!(summary.totals.errored_suites, 2);
    assert_eq!(summary.totals.tests(), 5);
    assert_eq!(summary.cache_hits, 1);
    assert_eq!(summary.execution_errors.len(), 1);
    assert_eq!(summary.failed_suites(), 3);
    assert_eq!(summary.duration(), Duration::from_secs(2));
    assert!(!summary.is_success());

    let paths: Vec<PathBuf> = summary.suites.iter().map(|s| s.file_path.clone()).collect();
    assert_eq!(
        paths,
        vec![PathBuf::from("broken"), PathBuf::from("cache"), PathBuf::from("mixed")]
    );
}

#[test]
fn other_generations_and_progress_updates_are_ignored() {
    init_tracing();
    let mut aggregator = RunAggregator::new(Generation(2), 1, Utc::now());

    aggregator.record(&message(Generation(1), "store", ExecutionUpdate::SuiteFinished(Ok(passing_suite("store")))));
    aggregator.record(&message(Generation(2), "store", ExecutionUpdate::SuiteStarted));
    aggregator.record(&message(
        Generation(2),
        "store",
        ExecutionUpdate::TestFinished(result("TestValue", TestStatus::Passed)),
    ));
    assert_eq!(aggregator.outstanding(), 1);

    let summary = aggregator.finish(Utc::now());
    assert!(summary.suites.is_empty());
    assert!(summary.is_success());
    assert_eq!(summary.generation, Generation(2));
}

proptest! {
    #[test]
    fn summary_does_not_depend_on_finish_order(
        order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle()
    ) {
        let start = Utc::now();
        let end = start + chrono::Duration::milliseconds(150);
        let messages: Vec<ExecutionMessage> = (0..6usize)
            .map(|i| {
                let path = format!("pkg{i}");
                if i % 3 == 0 {
                    finished(&path, mixed_suite(&path))
                } else {
                    finished(&path, passing_suite(path.clone()))
                }
            })
            .collect();

        let mut sorted = RunAggregator::new(Generation(1), 6, start);
        for msg in &messages {
            sorted.record(msg);
        }
        let mut shuffled = RunAggregator::new(Generation(1), 6, start);
        for i in &order {
            shuffled.record(&messages[*i]);
        }

        prop_assert_eq!(sorted.finish(end), shuffled.finish(end));
    }
}

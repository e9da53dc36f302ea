// tests/renderer.rs

mod common;
use crate::common::{Outcome, init_tracing, with_timeout};

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;

use sentinel::model::{
    ErrorKind, ExecutionError, Generation, RunSummary, SourceContext, SourceLine, SuiteError,
    TestError, TestResult, TestStatus, TestSuite, Totals,
};
use sentinel::render::format::ERROR_BLOCK_MARKER;
use sentinel::render::{IncrementalRenderer, RenderEvent, RenderOptions, SuitePhase, run_renderer};

fn passed(name: &str) -> TestResult {
    TestResult {
        name: name.to_string(),
        parent: None,
        status: TestStatus::Passed,
        elapsed: Duration::from_millis(4),
        output: Vec::new(),
        error: None,
    }
}

fn failed(name: &str, line: usize) -> TestResult {
    TestResult {
        name: name.to_string(),
        parent: None,
        status: TestStatus::Failed,
        elapsed: Duration::from_millis(7),
        output: vec![format!("cart_test.go:{line}: totals differ")],
        error: Some(TestError {
            message: "totals differ".to_string(),
            kind: ErrorKind::Assertion,
            file: Some("cart_test.go".to_string()),
            line: Some(line),
            source_context: SourceContext::Lines(vec![
                SourceLine {
                    number: line - 1,
                    text: "\tgot := Total(items)".to_string(),
                    is_error_line: false,
                },
                SourceLine {
                    number: line,
                    text: "\tt.Fatalf(\"totals differ\")".to_string(),
                    is_error_line: true,
                },
            ]),
        }),
    }
}

fn suite(path: &str, results: Vec<TestResult>) -> TestSuite {
    let mut suite = TestSuite::empty(path);
    suite.results = results;
    suite.elapsed = Duration::from_millis(40);
    suite
}

/// Start, per-test results and completion for one suite.
fn suite_events(suite: &TestSuite) -> Vec<RenderEvent> {
    let path = suite.file_path.clone();
    let mut events = vec![RenderEvent::SuiteStarted { suite: path.clone() }];
    events.extend(suite.results.iter().cloned().map(|result| RenderEvent::TestResult {
        suite: path.clone(),
        result,
    }));
    events.push(RenderEvent::SuiteCompleted {
        suite: path,
        outcome: Ok(suite.clone()),
    });
    events
}

fn feed(renderer: &mut IncrementalRenderer, events: Vec<RenderEvent>) -> Vec<String> {
    events.into_iter().flat_map(|e| renderer.handle(e)).collect()
}

fn summary(suites: Vec<TestSuite>) -> RunSummary {
    let mut totals = Totals::default();
    for s in &suites {
        totals.passed += s.passed();
        totals.failed += s.failed();
        totals.skipped += s.skipped();
        totals.timed_out += s.timed_out();
    }
    let now = Utc::now();
    RunSummary {
        generation: Generation(1),
        suites,
        execution_errors: Vec::new(),
        totals,
        cache_hits: 0,
        started_at: now,
        ended_at: now,
    }
}

fn markers(lines: &[String]) -> usize {
    lines.iter().filter(|l| l.starts_with(ERROR_BLOCK_MARKER)).count()
}

#[test]
fn passing_suite_collapses_to_one_line() {
    init_tracing();
    let mut renderer = IncrementalRenderer::new(RenderOptions::default());
    let cart = suite(
        "cart",
        (1..=5).map(|i| passed(&format!("TestCase{i}"))).collect(),
    );

    let lines = feed(&mut renderer, suite_events(&cart));

    assert_eq!(lines, vec!["✓ ./cart (5 tests) 40ms".to_string()]);
    assert_eq!(renderer.phase_of(Path::new("cart")), Some(SuitePhase::Settled));
}

#[test]
fn failing_suite_expands_with_one_block_per_failure() {
    init_tracing();
    let mut renderer = IncrementalRenderer::new(RenderOptions::default());
    let cart = suite(
        "cart",
        vec![passed("TestAdd"), failed("TestTotal", 12), failed("TestTax", 30)],
    );

    let lines = feed(&mut renderer, suite_events(&cart));

    assert!(lines[0].starts_with("✗ ./cart (3 tests | 2 failed)"), "{lines:?}");
    assert_eq!(markers(&lines), 2);
    assert!(lines.iter().any(|l| l == &format!("{ERROR_BLOCK_MARKER}TestTotal")));
    assert!(lines.iter().any(|l| l == "    at cart_test.go:30"));
    assert!(lines.iter().any(|l| l.starts_with("    > 12 |")));
}

#[test]
fn suite_error_is_shown_after_the_test_blocks() {
    init_tracing();
    let mut renderer = IncrementalRenderer::new(RenderOptions::default());
    let mut broken = suite("cart", Vec::new());
    broken.error = Some(SuiteError::Build {
        output: vec!["cart.go:3:1: syntax error".to_string()],
    });

    let lines = feed(&mut renderer, suite_events(&broken));

    assert!(lines[0].starts_with("✗ ./cart"));
    assert!(lines.iter().any(|l| l == "    cart.go:3:1: syntax error"));
}

#[test]
fn events_before_start_are_buffered_and_replayed() {
    init_tracing();
    let mut renderer = IncrementalRenderer::new(RenderOptions::default());
    let cart = suite("cart", vec![passed("TestAdd")]);
    let mut events = suite_events(&cart);
    let start = events.remove(0);

    let early = feed(&mut renderer, events);
    assert!(early.is_empty());
    assert_eq!(renderer.phase_of(Path::new("cart")), Some(SuitePhase::Pending));

    let lines = renderer.handle(start);
    assert_eq!(lines, vec!["✓ ./cart (1 test) 40ms".to_string()]);
    assert_eq!(renderer.phase_of(Path::new("cart")), Some(SuitePhase::Settled));
}

#[test]
fn verbose_mode_streams_each_test() {
    init_tracing();
    let mut renderer = IncrementalRenderer::new(RenderOptions { verbose: true });
    let cart = suite("cart", vec![passed("TestAdd"), passed("TestSub")]);

    let lines = feed(&mut renderer, suite_events(&cart));

    assert_eq!(
        lines,
        vec![
            " RUNS ./cart".to_string(),
            "    ✓ TestAdd 4ms".to_string(),
            "    ✓ TestSub 4ms".to_string(),
            "✓ ./cart (2 tests) 40ms".to_string(),
        ]
    );
}

#[test]
fn interleaved_suites_render_independently() {
    init_tracing();
    let mut renderer = IncrementalRenderer::new(RenderOptions::default());
    let cart = suite("cart", vec![passed("TestAdd")]);
    let shop = suite("shop", vec![failed("TestPay", 8)]);

    let mut a = suite_events(&cart).into_iter();
    let mut b = suite_events(&shop).into_iter();
    let mut lines = Vec::new();
    loop {
        let (x, y) = (a.next(), b.next());
        if x.is_none() && y.is_none() {
            break;
        }
        for event in x.into_iter().chain(y) {
            lines.extend(renderer.handle(event));
        }
    }

    assert!(lines.contains(&"✓ ./cart (1 test) 40ms".to_string()));
    assert_eq!(markers(&lines), 1);
}

#[test]
fn execution_errors_and_warnings_render_as_single_lines() {
    init_tracing();
    let mut renderer = IncrementalRenderer::new(RenderOptions::default());
    renderer.on_suite_start(Path::new("cart"));
    let lines = renderer.on_suite_complete(
        Path::new("cart"),
        Err(ExecutionError::Spawn("no such file".to_string())),
    );
    assert_eq!(
        lines,
        vec!["✗ ./cart failed to start test command: no such file".to_string()]
    );

    let warning = renderer.handle(RenderEvent::Warning("notes/todo.go is not in a package".to_string()));
    assert_eq!(warning, vec!["⚠ notes/todo.go is not in a package".to_string()]);
}

#[test]
fn supersession_resets_in_flight_suites() {
    init_tracing();
    let mut renderer = IncrementalRenderer::new(RenderOptions::default());
    renderer.on_suite_start(Path::new("cart"));

    let lines = renderer.handle(RenderEvent::RunSuperseded {
        generation: Generation(3),
    });

    assert_eq!(lines, vec!["↻ run 3 superseded by newer changes".to_string()]);
    assert_eq!(renderer.phase_of(Path::new("cart")), None);
}

#[test]
fn run_summary_counts_files_and_tests() {
    init_tracing();
    let mut renderer = IncrementalRenderer::new(RenderOptions::default());
    let summary = summary(vec![
        suite("cart", vec![passed("TestAdd"), passed("TestSub")]),
        suite("shop", vec![failed("TestPay", 8)]),
    ]);

    let lines = renderer.on_run_complete(&summary);

    assert!(lines.contains(&" Test Files  1 passed | 1 failed (2)".to_string()), "{lines:?}");
    assert!(lines.contains(&"      Tests  2 passed | 1 failed (3)".to_string()), "{lines:?}");
    assert_eq!(renderer.rendered(), lines.as_slice());
}

#[test]
fn suites_still_open_at_run_completion_are_flagged() {
    init_tracing();
    let mut renderer = IncrementalRenderer::new(RenderOptions::default());
    let cart = suite("cart", vec![passed("TestAdd")]);
    feed(&mut renderer, suite_events(&cart));
    renderer.on_suite_start(Path::new("shop"));
    renderer.handle(RenderEvent::TestResult {
        suite: "queue".into(),
        result: passed("TestPush"),
    });

    let lines = renderer.on_run_complete(&summary(vec![cart]));

    assert_eq!(lines[0], "⚠ ./queue did not report before the run completed");
    assert_eq!(lines[1], "⚠ ./shop did not report before the run completed");
    assert!(lines.contains(&" Test Files  1 passed (1)".to_string()), "{lines:?}");
    assert_eq!(renderer.phase_of(Path::new("shop")), None);
}

#[tokio::test]
async fn run_renderer_drains_the_channel() -> Outcome {
    init_tracing();
    let (tx, rx) = mpsc::channel(16);
    let task = tokio::spawn(run_renderer(
        IncrementalRenderer::new(RenderOptions::default()),
        rx,
        Vec::<u8>::new(),
    ));

    let cart = suite("cart", vec![passed("TestAdd")]);
    for event in suite_events(&cart) {
        tx.send(event).await?;
    }
    tx.send(RenderEvent::RunComplete(summary(vec![cart]))).await?;
    drop(tx);

    let renderer = with_timeout(task).await?;
    assert_eq!(renderer.rendered()[0], "✓ ./cart (1 test) 40ms");
    assert!(renderer
        .rendered()
        .iter()
        .any(|l| l == " Test Files  1 passed (1)"));
    Ok(())
}

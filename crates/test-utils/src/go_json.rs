//! Builders for `go test -json` output lines.

use serde_json::{Value, json};

fn line(mut record: Value, package: &str, test: Option<&str>) -> String {
    record["Package"] = json!(package);
    if let Some(test) = test {
        record["Test"] = json!(test);
    }
    record.to_string()
}

pub fn run(package: &str, test: &str) -> String {
    line(json!({"Action": "run"}), package, Some(test))
}

pub fn output(package: &str, test: &str, text: &str) -> String {
    line(json!({"Action": "output", "Output": text}), package, Some(test))
}

pub fn pass(package: &str, test: &str, elapsed: f64) -> String {
    line(json!({"Action": "pass", "Elapsed": elapsed}), package, Some(test))
}

pub fn fail(package: &str, test: &str, elapsed: f64) -> String {
    line(json!({"Action": "fail", "Elapsed": elapsed}), package, Some(test))
}

pub fn skip(package: &str, test: &str) -> String {
    line(json!({"Action": "skip", "Elapsed": 0.0}), package, Some(test))
}

pub fn package_output(package: &str, text: &str) -> String {
    line(json!({"Action": "output", "Output": text}), package, None)
}

pub fn package_pass(package: &str, elapsed: f64) -> String {
    line(json!({"Action": "pass", "Elapsed": elapsed}), package, None)
}

pub fn package_fail(package: &str, elapsed: f64) -> String {
    line(json!({"Action": "fail", "Elapsed": elapsed}), package, None)
}

/// A complete passing test: run, one output line, pass.
pub fn passing_test(package: &str, test: &str) -> Vec<String> {
    vec![
        run(package, test),
        output(package, test, &format!("=== RUN   {test}\n")),
        pass(package, test, 0.01),
    ]
}

/// A failing test reporting `message` at `file:line`.
pub fn failing_test(package: &str, test: &str, file: &str, line_no: usize, message: &str) -> Vec<String> {
    vec![
        run(package, test),
        output(package, test, &format!("=== RUN   {test}\n")),
        output(package, test, &format!("    {file}:{line_no}: {message}\n")),
        output(package, test, &format!("--- FAIL: {test} (0.00s)\n")),
        fail(package, test, 0.0),
    ]
}

pub fn join(lines: &[String]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

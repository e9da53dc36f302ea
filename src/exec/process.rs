// src/exec/process.rs

//! Runs the harness for a single target and streams its parsed results.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::exec::cancel::CancelSignal;
use crate::fs::FileSystem;
use crate::model::{
    ExecutionError, ExecutionMessage, ExecutionUpdate, SuiteError, TestSuite, TestTarget,
};
use crate::parser::{EventStreamParser, StreamEnd};

pub const TARGET_PLACEHOLDER: &str = "{target}";

/// Shell command template plus the directory it runs in.
#[derive(Debug, Clone)]
pub struct HarnessCommand {
    template: String,
    workdir: PathBuf,
    run_pattern: Option<String>,
}

impl HarnessCommand {
    pub fn new(template: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            workdir: workdir.into(),
            run_pattern: None,
        }
    }

    /// Restrict every invocation to tests matching `pattern` (`-run`).
    pub fn with_run_pattern(mut self, pattern: Option<String>) -> Self {
        self.run_pattern = pattern.filter(|p| !p.is_empty());
        self
    }

    /// The command line with the placeholder left in, for fingerprinting.
    pub fn describe(&self) -> String {
        self.append_run(self.template.clone())
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// The concrete command line for `target`.
    pub fn render(&self, target: &TestTarget) -> String {
        self.append_run(
            self.template
                .replace(TARGET_PLACEHOLDER, &target.package_pattern()),
        )
    }

    fn append_run(&self, mut line: String) -> String {
        if let Some(pattern) = &self.run_pattern {
            line.push_str(" -run ");
            line.push_str(&shell_quote(pattern));
        }
        line
    }

    fn command(&self, target: &TestTarget) -> Command {
        let line = self.render(target);
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&line);
            c
        };
        cmd.current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a kill also reaches whatever the shell spawned.
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

/// Quote `arg` as a single shell word.
fn shell_quote(arg: &str) -> String {
    if cfg!(windows) {
        format!("\"{}\"", arg.replace('"', "\"\""))
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// What became of one target.
#[derive(Debug)]
pub enum TargetOutcome {
    Finished(std::result::Result<TestSuite, ExecutionError>),
    /// Superseded while queued or running; nothing was reported.
    Cancelled,
}

#[derive(Debug)]
pub struct ProcessRunner {
    harness: HarnessCommand,
    timeout: Duration,
    fs: Arc<dyn FileSystem>,
    context_lines: usize,
}

impl ProcessRunner {
    pub fn new(
        harness: HarnessCommand,
        timeout: Duration,
        fs: Arc<dyn FileSystem>,
        context_lines: usize,
    ) -> Self {
        Self {
            harness,
            timeout,
            fs,
            context_lines,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `target`, sending `SuiteStarted`, one `TestFinished` per completed
    /// test, then `SuiteFinished`.
    ///
    /// On cancellation the child is killed and no `SuiteFinished` is sent.
    pub async fn run_target(
        &self,
        target: Arc<TestTarget>,
        cancel: &mut CancelSignal,
        tx: &mpsc::Sender<ExecutionMessage>,
    ) -> TargetOutcome {
        if cancel.is_cancelled() {
            return TargetOutcome::Cancelled;
        }

        let generation = cancel.generation();
        let send = |update| ExecutionMessage {
            generation,
            target: Arc::clone(&target),
            update,
        };

        if tx.send(send(ExecutionUpdate::SuiteStarted)).await.is_err() {
            return TargetOutcome::Cancelled;
        }

        let outcome = match self.run_inner(&target, cancel, tx).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    target = %target.path.display(),
                    generation = %generation,
                    error = %format!("{err:#}"),
                    "test command failed to run"
                );
                TargetOutcome::Finished(Err(ExecutionError::Spawn(format!("{err:#}"))))
            }
        };

        if let TargetOutcome::Finished(result) = &outcome
            && tx
                .send(send(ExecutionUpdate::SuiteFinished(result.clone())))
                .await
                .is_err()
        {
            debug!(target = %target.path.display(), "receiver gone before suite finished");
        }
        outcome
    }

    async fn run_inner(
        &self,
        target: &Arc<TestTarget>,
        cancel: &mut CancelSignal,
        tx: &mpsc::Sender<ExecutionMessage>,
    ) -> Result<TargetOutcome> {
        let generation = cancel.generation();
        info!(
            target = %target.path.display(),
            generation = %generation,
            cmd = %self.harness.render(target),
            "starting test process"
        );

        let mut child = self
            .harness
            .command(target)
            .spawn()
            .with_context(|| format!("spawning test command for {:?}", target.path))?;

        let stdout = child.stdout.take().context("child stdout was not captured")?;
        let stderr = child.stderr.take().context("child stderr was not captured")?;
        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();

        let mut parser = EventStreamParser::new(target.path.clone(), Arc::clone(&self.fs), self.context_lines)
            .with_source_root(self.harness.workdir());

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let (mut out_done, mut err_done) = (false, false);
        let mut timed_out = false;

        while !(out_done && err_done) {
            tokio::select! {
                line = out_lines.next_line(), if !out_done => match line {
                    Ok(Some(line)) => {
                        if let Some(result) = parser.feed_line(&line) {
                            let msg = ExecutionMessage {
                                generation,
                                target: Arc::clone(target),
                                update: ExecutionUpdate::TestFinished(result),
                            };
                            if tx.send(msg).await.is_err() {
                                kill(&mut child, target).await;
                                return Ok(TargetOutcome::Cancelled);
                            }
                        }
                    }
                    Ok(None) => out_done = true,
                    Err(e) => {
                        warn!(target = %target.path.display(), error = %e, "failed reading stdout");
                        out_done = true;
                    }
                },
                line = err_lines.next_line(), if !err_done => match line {
                    Ok(Some(line)) => parser.feed_raw(&line),
                    Ok(None) => err_done = true,
                    Err(e) => {
                        debug!(target = %target.path.display(), error = %e, "failed reading stderr");
                        err_done = true;
                    }
                },
                _ = &mut deadline => {
                    warn!(target = %target.path.display(), timeout_secs = self.timeout.as_secs(), "test process timed out; killing");
                    kill(&mut child, target).await;
                    timed_out = true;
                    break;
                }
                _ = cancel.cancelled() => {
                    info!(target = %target.path.display(), generation = %generation, "run superseded; killing test process");
                    kill(&mut child, target).await;
                    return Ok(TargetOutcome::Cancelled);
                }
            }
        }

        let status: Option<ExitStatus> = if timed_out {
            None
        } else {
            tokio::select! {
                status = child.wait() => Some(status.with_context(|| format!("waiting for test process of {:?}", target.path))?),
                _ = &mut deadline => {
                    warn!(target = %target.path.display(), "test process hung after closing output; killing");
                    kill(&mut child, target).await;
                    timed_out = true;
                    None
                }
                _ = cancel.cancelled() => {
                    kill(&mut child, target).await;
                    return Ok(TargetOutcome::Cancelled);
                }
            }
        };

        let end = if timed_out { StreamEnd::TimedOut } else { StreamEnd::Completed };
        let mut suite = parser.finish(end);

        if timed_out && suite.error.is_none() && suite.timed_out() == 0 {
            suite.error = Some(SuiteError::Timeout { after: self.timeout });
        }

        if let Some(status) = status
            && !status.success()
            && suite.error.is_none()
            && !suite.has_failures()
        {
            suite.error = Some(SuiteError::ExitStatus { code: status.code() });
        }

        info!(
            target = %target.path.display(),
            generation = %generation,
            passed = suite.passed(),
            failed = suite.failed(),
            skipped = suite.skipped(),
            timed_out = suite.timed_out(),
            suite_error = suite.error.is_some(),
            "test process finished"
        );

        Ok(TargetOutcome::Finished(Ok(suite)))
    }
}

async fn kill(child: &mut Child, target: &TestTarget) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: `kill` only sends a signal; the negative pid names the
        // group led by the harness shell.
        if unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) } != 0 {
            debug!(
                target = %target.path.display(),
                error = %std::io::Error::last_os_error(),
                "failed to signal test process group"
            );
        }
    }
    if let Err(e) = child.kill().await {
        warn!(target = %target.path.display(), error = %e, "failed to kill test process");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Fingerprint;

    fn target(dir: &str) -> TestTarget {
        TestTarget {
            path: PathBuf::from(dir),
            fingerprint: Fingerprint(String::new()),
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn run_pattern_is_appended_as_one_word() {
        let harness = HarnessCommand::new("go test -json {target}", ".")
            .with_run_pattern(Some("TestGet|TestPut".to_string()));
        assert_eq!(
            harness.render(&target("store")),
            "go test -json ./store -run 'TestGet|TestPut'"
        );
        assert_eq!(harness.describe(), "go test -json {target} -run 'TestGet|TestPut'");

        let plain = HarnessCommand::new("go test -json {target}", ".").with_run_pattern(Some(String::new()));
        assert_eq!(plain.render(&target("store")), "go test -json ./store");
    }

    #[cfg(unix)]
    #[test]
    fn quotes_inside_the_pattern_are_escaped() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}

// src/coordinator/aggregate.rs

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::model::{
    ExecutionError, ExecutionMessage, ExecutionUpdate, Generation, RunSummary, TestSuite, Totals,
};

/// Collects the finished suites of one generation.
///
/// The summary does not depend on the order suites finished in.
#[derive(Debug, Clone)]
pub struct RunAggregator {
    generation: Generation,
    started_at: DateTime<Utc>,
    expected: usize,
    suites: Vec<TestSuite>,
    execution_errors: Vec<(PathBuf, ExecutionError)>,
}

impl RunAggregator {
    pub fn new(generation: Generation, expected: usize, started_at: DateTime<Utc>) -> Self {
        Self {
            generation,
            started_at,
            expected,
            suites: Vec::new(),
            execution_errors: Vec::new(),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Targets that have not reported a final outcome yet.
    pub fn outstanding(&self) -> usize {
        self.expected
            .saturating_sub(self.suites.len() + self.execution_errors.len())
    }

    /// Fold one message in. Messages for other generations are ignored.
    pub fn record(&mut self, msg: &ExecutionMessage) {
        if msg.generation != self.generation {
            return;
        }
        match &msg.update {
            ExecutionUpdate::SuiteFinished(Ok(suite)) => self.suites.push(suite.clone()),
            ExecutionUpdate::SuiteFinished(Err(e)) => self
                .execution_errors
                .push((msg.target.path.clone(), e.clone())),
            ExecutionUpdate::SuiteStarted | ExecutionUpdate::TestFinished(_) => {}
        }
    }

    pub fn finish(mut self, ended_at: DateTime<Utc>) -> RunSummary {
        self.suites.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        self.execution_errors.sort_by(|a, b| a.0.cmp(&b.0));

        let mut totals = Totals::default();
        for suite in &self.suites {
            totals.passed += suite.passed();
            totals.failed += suite.failed();
            totals.skipped += suite.skipped();
            totals.timed_out += suite.timed_out();
            if suite.error.is_some() {
                totals.errored_suites += 1;
            }
        }
        totals.errored_suites += self.execution_errors.len();

        let cache_hits = self.suites.iter().filter(|s| s.from_cache).count();

        RunSummary {
            generation: self.generation,
            suites: self.suites,
            execution_errors: self.execution_errors,
            totals,
            cache_hits,
            started_at: self.started_at,
            ended_at,
        }
    }
}

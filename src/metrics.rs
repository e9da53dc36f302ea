// src/metrics.rs

//! Session counters exposed as a read-only snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::cache::ResultCache;
use crate::model::RunSummary;

#[derive(Debug, Default)]
pub struct RunMetrics {
    runs_triggered: AtomicU64,
    runs_completed: AtomicU64,
    runs_superseded: AtomicU64,
    targets_dispatched: AtomicU64,
    run_millis: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub runs_triggered: u64,
    pub runs_completed: u64,
    pub runs_superseded: u64,
    pub cache_hits: u64,
    pub cache_lookups: u64,
    pub cache_hit_rate: f64,
    pub average_run_duration: Duration,
    pub targets_per_run: f64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dispatch(&self, targets: usize) {
        self.runs_triggered.fetch_add(1, Ordering::Relaxed);
        self.targets_dispatched
            .fetch_add(targets as u64, Ordering::Relaxed);
    }

    pub fn record_superseded(&self) {
        self.runs_superseded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completion(&self, summary: &RunSummary) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        let millis = u64::try_from(summary.duration().as_millis()).unwrap_or(u64::MAX);
        self.run_millis.fetch_add(millis, Ordering::Relaxed);
    }

    /// Hit statistics come from `cache` when one is in use.
    #[must_use]
    pub fn snapshot(&self, cache: Option<&ResultCache>) -> MetricsSnapshot {
        let runs_triggered = self.runs_triggered.load(Ordering::Relaxed);
        let runs_completed = self.runs_completed.load(Ordering::Relaxed);
        let targets = self.targets_dispatched.load(Ordering::Relaxed);
        let run_millis = self.run_millis.load(Ordering::Relaxed);

        let (cache_hits, cache_lookups) = cache
            .map(|c| {
                let stats = c.stats();
                (stats.hits, stats.lookups())
            })
            .unwrap_or((0, 0));

        MetricsSnapshot {
            runs_triggered,
            runs_completed,
            runs_superseded: self.runs_superseded.load(Ordering::Relaxed),
            cache_hits,
            cache_lookups,
            cache_hit_rate: ratio(cache_hits, cache_lookups),
            average_run_duration: Duration::from_millis(run_millis.checked_div(runs_completed).unwrap_or(0)),
            targets_per_run: ratio(targets, runs_triggered),
        }
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

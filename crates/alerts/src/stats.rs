//! Process-lifetime run statistics.
//!
//! Counters live in memory only and start from zero on every restart.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::pipeline::{RunReport, RunTrigger};

/// What one completed run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub trigger: RunTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub evaluated: usize,
    pub owed: usize,
    pub deduplicated: usize,
    pub evaluation_errors: usize,
    pub sent: usize,
    pub failed: usize,
    pub persistence_failures: usize,
}

/// Lifetime counters. `succeeded + failed == attempted` after every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub persistence_failures: u64,
    pub runs_completed: u64,
    pub runs_aborted: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run_duration_ms: Option<u64>,
    pub last_run: Option<RunSummary>,
}

#[derive(Debug, Default)]
pub struct StatsAggregator {
    inner: Mutex<RunStats>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_stats<R>(&self, f: impl FnOnce(&mut RunStats) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// Fold a completed run into the lifetime counters.
    pub fn record_run(&self, report: &RunReport) {
        let summary = report.summary();
        let duration_ms = (report.finished_at - report.started_at).num_milliseconds().max(0) as u64;

        self.with_stats(|stats| {
            stats.attempted += (summary.sent + summary.failed) as u64;
            stats.succeeded += summary.sent as u64;
            stats.failed += summary.failed as u64;
            stats.persistence_failures += summary.persistence_failures as u64;
            stats.runs_completed += 1;
            stats.last_run_at = Some(report.started_at);
            stats.last_run_duration_ms = Some(duration_ms);
            stats.last_run = Some(summary);
        });
    }

    /// A run that never got to dispatch. Delivery counters stay untouched.
    pub fn record_abort(&self) {
        self.with_stats(|stats| stats.runs_aborted += 1);
    }

    pub fn snapshot(&self) -> RunStats {
        self.with_stats(|stats| stats.clone())
    }
}

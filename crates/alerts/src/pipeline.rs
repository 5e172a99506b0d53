//! One alert run, end to end.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rainalert_core::AlertError;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use crate::dedup::DedupFilter;
use crate::dispatcher::{BatchDispatcher, DispatchReport};
use crate::evaluator::{Evaluation, Evaluator};
use crate::stats::{RunSummary, StatsAggregator};
use crate::store::SubscriptionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunTrigger {
    Scheduled,
    Manual,
}

impl std::fmt::Display for RunTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunTrigger::Scheduled => f.write_str("scheduled"),
            RunTrigger::Manual => f.write_str("manual"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub trigger: RunTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Active subscriptions looked at.
    pub evaluated: usize,
    /// Jobs the evaluator produced, before dedup.
    pub owed: usize,
    /// Jobs dropped because the subscriber was already notified today.
    pub deduplicated: usize,
    pub evaluation_errors: usize,
    pub dispatch: DispatchReport,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            trigger: self.trigger,
            started_at: self.started_at,
            finished_at: self.finished_at,
            evaluated: self.evaluated,
            owed: self.owed,
            deduplicated: self.deduplicated,
            evaluation_errors: self.evaluation_errors,
            sent: self.dispatch.succeeded(),
            failed: self.dispatch.failed(),
            persistence_failures: self.dispatch.persistence_failures(),
        }
    }
}

/// Evaluate → dedup → dispatch → stats, serialized by one execution lock.
pub struct AlertPipeline {
    store: Arc<dyn SubscriptionStore>,
    evaluator: Evaluator,
    dedup: DedupFilter,
    dispatcher: BatchDispatcher,
    stats: Arc<StatsAggregator>,
    run_lock: Arc<Mutex<()>>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the run ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl AlertPipeline {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        evaluator: Evaluator,
        dedup: DedupFilter,
        dispatcher: BatchDispatcher,
        stats: Arc<StatsAggregator>,
    ) -> Self {
        Self {
            store,
            evaluator,
            dedup,
            dispatcher,
            stats,
            run_lock: Arc::new(Mutex::new(())),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn stats(&self) -> &Arc<StatsAggregator> {
        &self.stats
    }

    pub fn dedup(&self) -> &DedupFilter {
        &self.dedup
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run now, waiting for an in-flight run to finish first.
    pub async fn run(&self, trigger: RunTrigger) -> Result<RunReport, AlertError> {
        let _guard = self.run_lock.lock().await;
        self.execute(trigger, Utc::now()).await
    }

    /// Run now, or fail with [`AlertError::RunInProgress`] if one is in flight.
    pub async fn try_run(&self, trigger: RunTrigger) -> Result<RunReport, AlertError> {
        self.try_run_at(trigger, Utc::now()).await
    }

    /// As [`try_run`](Self::try_run) with an explicit run start time.
    pub async fn try_run_at(&self, trigger: RunTrigger, started_at: DateTime<Utc>) -> Result<RunReport, AlertError> {
        let _guard = self.run_lock.try_lock().map_err(|_| AlertError::RunInProgress)?;
        self.execute(trigger, started_at).await
    }

    /// As [`try_run`](Self::try_run), but the run executes in its own task.
    ///
    /// Once the execution lock is taken the run goes to completion even if
    /// the returned future is dropped.
    pub async fn try_run_detached(self: &Arc<Self>, trigger: RunTrigger) -> Result<RunReport, AlertError> {
        let guard = Arc::clone(&self.run_lock)
            .try_lock_owned()
            .map_err(|_| AlertError::RunInProgress)?;
        let pipeline = Arc::clone(self);
        let started_at = Utc::now();

        tokio::spawn(async move {
            let _guard = guard;
            pipeline.execute(trigger, started_at).await
        })
        .await
        .map_err(|e| {
            error!(error = %e, "alert run task ended abnormally");
            AlertError::Other(format!("alert run task failed: {e}"))
        })?
    }

    async fn execute(&self, trigger: RunTrigger, started_at: DateTime<Utc>) -> Result<RunReport, AlertError> {
        let _in_flight = InFlight::enter(&self.in_flight);
        let run_id = Uuid::new_v4();
        info!(%run_id, %trigger, "alert run started");

        let subscriptions = match self.store.list_active().await {
            Ok(subs) => subs,
            Err(e) => {
                self.stats.record_abort();
                error!(%run_id, error = %e, "alert run aborted: could not load active subscriptions");
                return Err(e);
            }
        };

        let mut jobs = Vec::new();
        let mut evaluated = 0;
        let mut owed = 0;
        let mut deduplicated = 0;
        let mut evaluation_errors = 0;

        for subscription in subscriptions.iter().filter(|s| s.active) {
            evaluated += 1;
            match self.evaluator.evaluate(subscription).await {
                Evaluation::Owed(job) => {
                    owed += 1;
                    match self.dedup.admit(job, subscription.last_notified, started_at) {
                        Some(job) => jobs.push(job),
                        None => deduplicated += 1,
                    }
                }
                Evaluation::NotOwed => {}
                Evaluation::Failed { .. } => evaluation_errors += 1,
            }
        }

        let dispatch = self.dispatcher.dispatch(jobs, started_at).await;

        let report = RunReport {
            run_id,
            trigger,
            started_at,
            finished_at: Utc::now(),
            evaluated,
            owed,
            deduplicated,
            evaluation_errors,
            dispatch,
        };
        self.stats.record_run(&report);

        info!(
            %run_id,
            evaluated,
            owed,
            deduplicated,
            evaluation_errors,
            sent = report.dispatch.succeeded(),
            failed = report.dispatch.failed(),
            "alert run finished"
        );
        Ok(report)
    }
}

//! [`AlertScheduler`]: start/stop lifecycle, manual trigger and status.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use rainalert_core::AlertError;

use crate::pipeline::{AlertPipeline, RunReport, RunTrigger};
use crate::stats::RunStats;

use super::cron::{next_fire, next_fire_after_previous, parse_schedule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Stopped,
    Scheduled,
    Running,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    /// Daily firing is enabled.
    pub running: bool,
    pub run_in_progress: bool,
    pub schedule: String,
    pub timezone: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub stats: RunStats,
}

struct LoopHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct AlertScheduler {
    pipeline: Arc<AlertPipeline>,
    schedule: Schedule,
    cron_expr: String,
    tz: Tz,
    handle: Mutex<Option<LoopHandle>>,
}

impl AlertScheduler {
    /// Validates the cron expression; does not start anything.
    pub fn new(pipeline: Arc<AlertPipeline>, cron_expr: &str, tz: Tz) -> Result<Self, AlertError> {
        let schedule = parse_schedule(cron_expr)?;
        Ok(Self {
            pipeline,
            schedule,
            cron_expr: cron_expr.trim().to_string(),
            tz,
            handle: Mutex::new(None),
        })
    }

    pub fn pipeline(&self) -> &Arc<AlertPipeline> {
        &self.pipeline
    }

    fn lock_handle(&self) -> std::sync::MutexGuard<'_, Option<LoopHandle>> {
        self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Begin daily firing. Returns `false` if already scheduled.
    pub fn start(&self) -> bool {
        let mut handle = self.lock_handle();
        if handle.is_some() {
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(self.pipeline.clone(), self.schedule.clone(), self.tz, stop_rx));
        *handle = Some(LoopHandle { stop_tx, task });

        info!(
            schedule = %self.cron_expr,
            tz = %self.tz,
            next_run = ?self.next_run(),
            "alert scheduler started"
        );
        true
    }

    /// Cancel future firings. An in-flight run is left to finish.
    /// Returns `false` if not scheduled.
    pub fn stop(&self) -> bool {
        let Some(handle) = self.lock_handle().take() else {
            return false;
        };
        // The loop exits on its own once the current run, if any, returns.
        let _ = handle.stop_tx.send(true);
        info!("alert scheduler stopped");
        true
    }

    /// Stop and wait for the loop task, including any in-flight run.
    pub async fn shutdown(&self) {
        let handle = self.lock_handle().take();
        if let Some(handle) = handle {
            let _ = handle.stop_tx.send(true);
            if let Err(e) = handle.task.await {
                warn!(error = %e, "alert scheduler task ended abnormally");
            }
            info!("alert scheduler shut down");
        }
    }

    /// Run the pipeline now. Rejected while another run is in flight.
    /// A started run finishes even if the caller stops waiting.
    pub async fn trigger_now(&self) -> Result<RunReport, AlertError> {
        self.pipeline.try_run_detached(RunTrigger::Manual).await
    }

    pub fn is_scheduled(&self) -> bool {
        self.lock_handle().is_some()
    }

    pub fn state(&self) -> SchedulerState {
        if self.pipeline.is_running() {
            SchedulerState::Running
        } else if self.is_scheduled() {
            SchedulerState::Scheduled
        } else {
            SchedulerState::Stopped
        }
    }

    /// Next fire time after now, whether or not the scheduler is started.
    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        self.next_run_after(Utc::now())
    }

    pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        next_fire(&self.schedule, now, self.tz)
    }

    pub fn status(&self) -> SchedulerStatus {
        let stats = self.pipeline.stats().snapshot();
        let state = self.state();
        SchedulerStatus {
            state,
            running: self.is_scheduled(),
            run_in_progress: state == SchedulerState::Running,
            schedule: self.cron_expr.clone(),
            timezone: self.tz.to_string(),
            last_run_at: stats.last_run_at,
            next_run_at: self.next_run(),
            stats,
        }
    }
}

async fn run_loop(pipeline: Arc<AlertPipeline>, schedule: Schedule, tz: Tz, mut stop_rx: watch::Receiver<bool>) {
    let mut previous: Option<DateTime<Utc>> = None;
    loop {
        if *stop_rx.borrow() {
            break;
        }

        let now = Utc::now();
        let Some(next) = next_fire_after_previous(&schedule, now, previous, tz) else {
            warn!("alert schedule has no future fire times; scheduler loop exiting");
            break;
        };
        let wait = (next - now).to_std().unwrap_or_default();

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = stop_rx.changed() => break,
        }
        previous = Some(next);

        match pipeline.run(RunTrigger::Scheduled).await {
            Ok(report) => info!(
                run_id = %report.run_id,
                next_run = ?next_fire(&schedule, Utc::now(), tz),
                "scheduled alert run complete"
            ),
            Err(e) => error!(error = %e, "scheduled alert run failed"),
        }
    }
}

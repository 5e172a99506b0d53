//! Batched, paced delivery of notification jobs.
//!
//! Jobs are split into fixed-size batches and sent strictly in order. One
//! job failing never stops the jobs after it. A confirmed send is followed
//! by a `mark_notified` write; a failed send leaves the subscription as it was.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rainalert_core::config::DispatchConfig;
use rainalert_core::{NotificationJob, SubscriberId};
use rainalert_notify::{NotificationChannel, SendOutcome};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::pacer::DispatchPacer;
use crate::store::SubscriptionStore;

/// Same-run retry for transient send failures. One attempt means no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Backoff before attempt `attempt + 1`, doubling each time.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Outcome for one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub subscriber_id: SubscriberId,
    pub batch: usize,
    pub success: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// `last_notified` was written. Always false for failed sends.
    pub persisted: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub batches: usize,
    pub results: Vec<JobResult>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    /// Delivered, but `last_notified` was not recorded.
    pub fn persistence_failures(&self) -> usize {
        self.results.iter().filter(|r| r.success && !r.persisted).count()
    }
}

pub struct BatchDispatcher {
    channel: Arc<dyn NotificationChannel>,
    store: Arc<dyn SubscriptionStore>,
    pacer: Arc<dyn DispatchPacer>,
    batch_size: usize,
    retry: RetryPolicy,
}

impl BatchDispatcher {
    pub fn new(
        channel: Arc<dyn NotificationChannel>,
        store: Arc<dyn SubscriptionStore>,
        pacer: Arc<dyn DispatchPacer>,
        batch_size: usize,
    ) -> Self {
        Self {
            channel,
            store,
            pacer,
            batch_size: batch_size.max(1),
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = RetryPolicy {
            max_attempts: retry.max_attempts.max(1),
            ..retry
        };
        self
    }

    /// Build from the `DISPATCH_*` settings.
    pub fn from_config(
        config: &DispatchConfig,
        channel: Arc<dyn NotificationChannel>,
        store: Arc<dyn SubscriptionStore>,
        pacer: Arc<dyn DispatchPacer>,
    ) -> Self {
        Self::new(channel, store, pacer, config.batch_size).with_retry(RetryPolicy {
            max_attempts: config.max_attempts,
            initial_backoff: config.retry_backoff(),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn channel_name(&self) -> &str {
        self.channel.channel_name()
    }

    /// Send `jobs` in order. Successful sends record `notified_at`.
    pub async fn dispatch(&self, jobs: Vec<NotificationJob>, notified_at: DateTime<Utc>) -> DispatchReport {
        let mut report = DispatchReport::default();
        if jobs.is_empty() {
            return report;
        }

        let batch_count = jobs.len().div_ceil(self.batch_size);
        report.results.reserve(jobs.len());

        for (batch_index, batch) in jobs.chunks(self.batch_size).enumerate() {
            let batch_no = batch_index + 1;
            debug!(batch = batch_no, of = batch_count, size = batch.len(), "dispatching batch");

            for (job_index, job) in batch.iter().enumerate() {
                if job_index > 0 {
                    self.pacer.between_jobs().await;
                }
                let result = self.dispatch_one(job, batch_no, notified_at).await;
                report.results.push(result);
            }

            report.batches += 1;
            if batch_no < batch_count {
                self.pacer.between_batches().await;
            }
        }

        info!(
            channel = self.channel.channel_name(),
            batches = report.batches,
            sent = report.succeeded(),
            failed = report.failed(),
            "dispatch finished"
        );
        report
    }

    async fn dispatch_one(&self, job: &NotificationJob, batch: usize, notified_at: DateTime<Utc>) -> JobResult {
        let start = Instant::now();
        let (outcome, attempts) = self.send_with_retry(job).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        let subscriber_id = job.subscriber_id.as_str();

        if !outcome.success {
            warn!(
                subscriber_id,
                channel = self.channel.channel_name(),
                batch,
                attempts,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                duration_ms,
                "alert delivery failed"
            );
            return JobResult {
                subscriber_id: job.subscriber_id.clone(),
                batch,
                success: false,
                attempts,
                provider_message_id: None,
                error: outcome.error,
                persisted: false,
                duration_ms,
            };
        }

        info!(
            subscriber_id,
            channel = self.channel.channel_name(),
            batch,
            provider_message_id = outcome.provider_message_id.as_deref().unwrap_or("-"),
            duration_ms,
            "alert delivered"
        );

        let persisted = match self.store.mark_notified(&job.subscriber_id, notified_at).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    subscriber_id,
                    error = %e,
                    "delivered but last-notified not recorded"
                );
                false
            }
        };

        JobResult {
            subscriber_id: job.subscriber_id.clone(),
            batch,
            success: true,
            attempts,
            provider_message_id: outcome.provider_message_id,
            error: None,
            persisted,
            duration_ms,
        }
    }

    async fn send_with_retry(&self, job: &NotificationJob) -> (SendOutcome, u32) {
        let mut attempt = 1;
        loop {
            let outcome = self.channel.send(&job.destination, &job.message).await;
            if outcome.success || !outcome.transient || attempt >= self.retry.max_attempts {
                return (outcome, attempt);
            }

            let backoff = self.retry.backoff_after(attempt);
            debug!(
                subscriber_id = %job.subscriber_id,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                "transient send failure, retrying"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

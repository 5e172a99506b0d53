//! Pacing policy for outbound sends.
//!
//! The dispatcher asks the pacer to wait between jobs inside a batch and
//! between batches. Swapping the policy changes the send rate without
//! touching dispatch order or batch sizes.

use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait DispatchPacer: Send + Sync {
    /// Called between two consecutive jobs of the same batch.
    async fn between_jobs(&self);

    /// Called between two batches, never after the last one.
    async fn between_batches(&self);
}

/// Sleeps a fixed interval at each gap.
#[derive(Debug, Clone, Copy)]
pub struct FixedIntervalPacer {
    pub job_delay: Duration,
    pub batch_delay: Duration,
}

impl FixedIntervalPacer {
    pub fn new(job_delay: Duration, batch_delay: Duration) -> Self {
        Self { job_delay, batch_delay }
    }
}

impl Default for FixedIntervalPacer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(5))
    }
}

#[async_trait]
impl DispatchPacer for FixedIntervalPacer {
    async fn between_jobs(&self) {
        if !self.job_delay.is_zero() {
            tokio::time::sleep(self.job_delay).await;
        }
    }

    async fn between_batches(&self) {
        if !self.batch_delay.is_zero() {
            tokio::time::sleep(self.batch_delay).await;
        }
    }
}

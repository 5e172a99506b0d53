//! Dry-run channel: logs the message instead of sending it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::traits::{NotificationChannel, NotifyError};

#[derive(Debug, Default)]
pub struct LogChannel {
    sent: AtomicU64,
}

impl LogChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl NotificationChannel for LogChannel {
    async fn deliver(&self, destination: &str, message: &str) -> Result<Option<String>, NotifyError> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(to = %destination, chars = message.chars().count(), "[dry-run] alert message:\n{message}");
        Ok(Some(format!("dry-run-{n}")))
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}

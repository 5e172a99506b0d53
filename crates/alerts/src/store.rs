//! Subscription store contract and the in-process implementation.

use std::path::Path;

use chrono::{DateTime, Utc};
use rainalert_core::{AlertError, SubscriberId, Subscription};
use tokio::sync::RwLock;

/// Where subscriptions live. Each `mark_notified` is an independent write.
#[async_trait::async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Active subscriptions in a stable order.
    async fn list_active(&self) -> Result<Vec<Subscription>, AlertError>;

    /// Set `last_notified` for one subscriber.
    async fn mark_notified(&self, id: &SubscriberId, at: DateTime<Utc>) -> Result<(), AlertError>;
}

/// In-memory store, ordered by insertion.
#[derive(Debug, Default)]
pub struct MemoryStore {
    subscriptions: RwLock<Vec<Subscription>>,
}

impl MemoryStore {
    pub fn new(subscriptions: Vec<Subscription>) -> Self {
        Self {
            subscriptions: RwLock::new(subscriptions),
        }
    }

    /// Load a JSON array of subscriptions.
    pub fn from_json_file(path: &Path) -> Result<Self, AlertError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AlertError::Store(format!("reading {}: {e}", path.display())))?;
        let subscriptions: Vec<Subscription> = serde_json::from_str(&raw)
            .map_err(|e| AlertError::Store(format!("parsing {}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), count = subscriptions.len(), "loaded subscriptions");
        Ok(Self::new(subscriptions))
    }

    pub async fn insert(&self, subscription: Subscription) {
        self.subscriptions.write().await.push(subscription);
    }

    pub async fn get(&self, id: &SubscriberId) -> Option<Subscription> {
        self.subscriptions
            .read()
            .await
            .iter()
            .find(|s| &s.id == id)
            .cloned()
    }

    pub async fn all(&self) -> Vec<Subscription> {
        self.subscriptions.read().await.clone()
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for MemoryStore {
    async fn list_active(&self) -> Result<Vec<Subscription>, AlertError> {
        Ok(self
            .subscriptions
            .read()
            .await
            .iter()
            .filter(|s| s.active)
            .cloned()
            .collect())
    }

    async fn mark_notified(&self, id: &SubscriberId, at: DateTime<Utc>) -> Result<(), AlertError> {
        let mut subscriptions = self.subscriptions.write().await;
        let subscription = subscriptions
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| AlertError::Store(format!("unknown subscriber {id}")))?;
        subscription.last_notified = Some(at);
        Ok(())
    }
}

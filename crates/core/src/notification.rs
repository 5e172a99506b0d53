use serde::{Deserialize, Serialize};

use crate::subscription::SubscriberId;

/// A rendered alert owed to one subscriber in the current run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationJob {
    pub subscriber_id: SubscriberId,
    pub destination: String,
    pub message: String,
}

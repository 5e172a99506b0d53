use std::sync::Arc;

use rainalert_alerts::AlertScheduler;

pub struct AppState {
    pub scheduler: Arc<AlertScheduler>,
    /// Name of the delivery channel in use ("whatsapp", "webhook", "log").
    pub channel: String,
    /// Config with secrets removed, for `/health`.
    pub config_summary: serde_json::Value,
}

//! Notification channel trait definition and shared error types.

use rainalert_core::is_valid_destination;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    #[error("Provider returned {status}: {message}")]
    Provider { status: u16, message: String },
}

impl NotifyError {
    /// Whether sending the same message again later in the run could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            NotifyError::Http(_) | NotifyError::RateLimited { .. } => true,
            NotifyError::Provider { status, .. } => *status >= 500,
            NotifyError::Template(_) | NotifyError::Config(_) | NotifyError::InvalidDestination(_) => false,
        }
    }
}

/// Result of a single send attempt.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SendOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure that may clear up on another attempt.
    #[serde(skip)]
    pub transient: bool,
}

impl SendOutcome {
    pub fn delivered(provider_message_id: Option<String>) -> Self {
        Self {
            success: true,
            provider_message_id,
            error: None,
            transient: false,
        }
    }

    pub fn failed(error: &NotifyError) -> Self {
        Self {
            success: false,
            provider_message_id: None,
            error: Some(error.to_string()),
            transient: error.is_transient(),
        }
    }
}

/// Trait for notification channel implementations.
///
/// Implementors provide `deliver`; callers use `send`, which never fails:
/// invalid destinations and delivery errors come back as `success: false`.
#[async_trait::async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver one message, returning the provider's message id if it gave one.
    async fn deliver(&self, destination: &str, message: &str) -> Result<Option<String>, NotifyError>;

    /// Human-readable name for this channel (e.g., "whatsapp", "webhook").
    fn channel_name(&self) -> &str;

    async fn send(&self, destination: &str, message: &str) -> SendOutcome {
        if !is_valid_destination(destination) {
            return SendOutcome::failed(&NotifyError::InvalidDestination(destination.to_string()));
        }
        match self.deliver(destination, message).await {
            Ok(id) => SendOutcome::delivered(id),
            Err(e) => SendOutcome::failed(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockChannel {
        calls: Arc<AtomicUsize>,
        result: fn() -> Result<Option<String>, NotifyError>,
    }

    #[async_trait::async_trait]
    impl NotificationChannel for MockChannel {
        async fn deliver(&self, _destination: &str, _message: &str) -> Result<Option<String>, NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }

        fn channel_name(&self) -> &str {
            "mock"
        }
    }

    #[tokio::test]
    async fn invalid_destination_never_reaches_deliver() {
        let calls = Arc::new(AtomicUsize::new(0));
        let channel = MockChannel {
            calls: calls.clone(),
            result: || Ok(Some("id-1".into())),
        };

        let outcome = channel.send("not-a-number", "hi").await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("Invalid destination"));
        assert!(!outcome.transient);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn delivery_error_becomes_failed_outcome() {
        let channel = MockChannel {
            calls: Arc::new(AtomicUsize::new(0)),
            result: || Err(NotifyError::RateLimited { retry_after_secs: 3 }),
        };

        let outcome = channel.send("+919812345678", "hi").await;
        assert!(!outcome.success);
        assert!(outcome.transient);
        assert_eq!(outcome.provider_message_id, None);
    }

    #[tokio::test]
    async fn success_carries_provider_id() {
        let channel = MockChannel {
            calls: Arc::new(AtomicUsize::new(0)),
            result: || Ok(Some("SM123".into())),
        };

        let outcome = channel.send("whatsapp:+919812345678", "hi").await;
        assert_eq!(outcome, SendOutcome::delivered(Some("SM123".into())));
    }

    #[test]
    fn provider_errors_are_transient_only_for_5xx() {
        let server = NotifyError::Provider { status: 503, message: "down".into() };
        let client = NotifyError::Provider { status: 400, message: "bad".into() };
        assert!(server.is_transient());
        assert!(!client.is_transient());
    }
}

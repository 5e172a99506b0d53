//! Generic HTTP webhook channel.
//!
//! Posts `{"to": ..., "message": ...}` as JSON to a configured URL, for
//! gateways that front an SMS or WhatsApp provider.

use std::collections::HashMap;

use crate::traits::{NotificationChannel, NotifyError};

#[derive(Debug)]
pub struct WebhookChannel {
    /// Target URL (env vars already resolved).
    url: String,
    /// Custom headers to include on every request.
    headers: HashMap<String, String>,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl WebhookChannel {
    /// Create a new webhook channel.
    ///
    /// Environment variable references (`${VAR_NAME}`) in `url` and
    /// header values are resolved eagerly. Missing env vars produce
    /// a [`NotifyError::Config`] error.
    pub fn new(url: &str, headers: HashMap<String, String>) -> Result<Self, NotifyError> {
        let resolved_url = resolve_env_vars(url)?;

        let mut resolved_headers = HashMap::with_capacity(headers.len());
        for (key, value) in &headers {
            resolved_headers.insert(key.clone(), resolve_env_vars(value)?);
        }

        Ok(Self {
            url: resolved_url,
            headers: resolved_headers,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait::async_trait]
impl NotificationChannel for WebhookChannel {
    async fn deliver(&self, destination: &str, message: &str) -> Result<Option<String>, NotifyError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "to": destination, "message": message }));

        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(NotifyError::RateLimited { retry_after_secs: 30 });
        }

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                url = %self.url,
                %status,
                body = %body_text,
                "webhook returned non-2xx status"
            );
            return Err(NotifyError::Provider {
                status: status.as_u16(),
                message: body_text,
            });
        }

        // Gateways that answer with JSON may carry a message id.
        let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
        let id = ["id", "sid", "message_id"]
            .iter()
            .find_map(|key| match body.get(key) {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                _ => None,
            });

        tracing::debug!(url = %self.url, %status, "webhook notification delivered");
        Ok(id)
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
///
/// Returns an error if a referenced variable is not set.
fn resolve_env_vars(input: &str) -> Result<String, NotifyError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(NotifyError::Config(format!(
                    "unclosed env var reference in: {input}"
                )));
            }
            let value = std::env::var(&var_name).map_err(|_| {
                NotifyError::Config(format!("env var not found: {var_name}"))
            })?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

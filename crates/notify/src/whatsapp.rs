//! WhatsApp delivery through the Twilio Messages API.
//!
//! Messages are sent as a form POST to
//! `{api_base}/2010-04-01/Accounts/{sid}/Messages.json` with HTTP basic auth.
//! The returned message `sid` becomes the provider message id.

use rainalert_core::config::WhatsAppConfig;
use rainalert_core::{bare_destination, WHATSAPP_PREFIX};

use crate::traits::{NotificationChannel, NotifyError};

/// Twilio rejects WhatsApp bodies longer than this many characters.
pub const MAX_BODY_CHARS: usize = 1600;

#[derive(Debug)]
pub struct WhatsAppChannel {
    account_sid: String,
    auth_token: String,
    /// Sender address, always carrying the `whatsapp:` prefix.
    from: String,
    api_base: String,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    /// Build the channel from the `TWILIO_*` settings.
    ///
    /// Returns [`NotifyError::Config`] when the account sid, auth token or
    /// sender number is missing.
    pub fn from_config(config: &WhatsAppConfig) -> Result<Self, NotifyError> {
        let missing = |key: &str| NotifyError::Config(format!("{key} is not set"));
        let account_sid = config.account_sid.clone().ok_or_else(|| missing("TWILIO_ACCOUNT_SID"))?;
        let auth_token = config.auth_token.clone().ok_or_else(|| missing("TWILIO_AUTH_TOKEN"))?;
        let from = config.from.as_deref().ok_or_else(|| missing("TWILIO_WHATSAPP_FROM"))?;

        Ok(Self {
            account_sid,
            auth_token,
            from: whatsapp_address(from),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

/// `+91...` or `whatsapp:+91...` → `whatsapp:+91...`.
fn whatsapp_address(number: &str) -> String {
    format!("{WHATSAPP_PREFIX}{}", bare_destination(number))
}

fn truncate_body(message: &str) -> String {
    message.chars().take(MAX_BODY_CHARS).collect()
}

#[async_trait::async_trait]
impl NotificationChannel for WhatsAppChannel {
    async fn deliver(&self, destination: &str, message: &str) -> Result<Option<String>, NotifyError> {
        let to = whatsapp_address(destination);
        let body = truncate_body(message);
        if body.len() < message.len() {
            tracing::debug!(to = %to, "message truncated to {MAX_BODY_CHARS} characters");
        }

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("From", self.from.as_str()), ("To", to.as_str()), ("Body", body.as_str())])
            .send()
            .await?;

        let status = response.status();

        // Handle rate limiting (HTTP 429).
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(30);
            return Err(NotifyError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let resp_body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);

        if !status.is_success() {
            let description = resp_body
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown Twilio API error");
            tracing::warn!(to = %to, %status, "Twilio rejected WhatsApp message");
            return Err(NotifyError::Provider {
                status: status.as_u16(),
                message: description.to_string(),
            });
        }

        let sid = resp_body.get("sid").and_then(|v| v.as_str()).map(str::to_string);
        tracing::debug!(to = %to, sid = ?sid, "WhatsApp message accepted");
        Ok(sid)
    }

    fn channel_name(&self) -> &str {
        "whatsapp"
    }
}

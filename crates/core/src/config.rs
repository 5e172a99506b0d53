use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::AlertError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub schedule: ScheduleConfig,
    pub dispatch: DispatchConfig,
    pub forecast: ForecastConfig,
    pub whatsapp: WhatsAppConfig,
    pub webhook: WebhookConfig,
    pub postgres: PostgresConfig,
    pub server: ServerConfig,
}

/// Well-known env keys that identify a profile when prefixed.
const PROFILE_MARKER_KEYS: &[&str] = &[
    "ALERT_SCHEDULE",
    "TWILIO_ACCOUNT_SID",
    "PG_HOST",
    "NOTIFY_WEBHOOK_URL",
];

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `RAINALERT_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("RAINALERT_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            schedule: ScheduleConfig::from_env_profiled(p),
            dispatch: DispatchConfig::from_env_profiled(p),
            forecast: ForecastConfig::from_env_profiled(p),
            whatsapp: WhatsAppConfig::from_env_profiled(p),
            webhook: WebhookConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            server: ServerConfig::from_env_profiled(p),
        }
    }

    /// Discover available profiles by scanning env vars for `{PREFIX}_{MARKER_KEY}` patterns.
    /// Always includes "default" (the unprefixed config).
    pub fn available_profiles() -> Vec<String> {
        let mut profiles = std::collections::BTreeSet::new();
        profiles.insert("default".to_string());

        for (key, _) in env::vars() {
            for marker in PROFILE_MARKER_KEYS {
                if let Some(prefix) = key.strip_suffix(&format!("_{}", marker)) {
                    if !prefix.is_empty()
                        && prefix.chars().all(|c| c.is_ascii_uppercase() || c == '_')
                    {
                        profiles.insert(prefix.to_string());
                    }
                }
            }
        }

        profiles.into_iter().collect()
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Fail fast on values that would otherwise only break at run time.
    pub fn validate(&self) -> Result<(), AlertError> {
        self.schedule.timezone()?;
        if self.dispatch.batch_size == 0 {
            return Err(AlertError::Config("DISPATCH_BATCH_SIZE must be at least 1".into()));
        }
        if self.dispatch.max_attempts == 0 {
            return Err(AlertError::Config("DISPATCH_MAX_ATTEMPTS must be at least 1".into()));
        }
        if self.webhook.is_configured() {
            self.webhook.headers()?;
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  schedule:    cron='{}', tz={}", self.schedule.cron, self.schedule.timezone);
        tracing::info!(
            "  dispatch:    batch_size={}, job_delay={}ms, batch_delay={}ms, max_attempts={}",
            self.dispatch.batch_size,
            self.dispatch.job_delay_ms,
            self.dispatch.batch_delay_ms,
            self.dispatch.max_attempts
        );
        tracing::info!("  forecast:    url={}", self.forecast.base_url);
        tracing::info!("  whatsapp:    configured={}", self.whatsapp.is_configured());
        tracing::info!("  webhook:     configured={}", self.webhook.is_configured());
        tracing::info!("  postgres:    host={}, db={}", self.postgres.host, self.postgres.database);
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "schedule": { "cron": self.schedule.cron, "timezone": self.schedule.timezone },
            "dispatch": {
                "batch_size": self.dispatch.batch_size,
                "job_delay_ms": self.dispatch.job_delay_ms,
                "batch_delay_ms": self.dispatch.batch_delay_ms,
                "max_attempts": self.dispatch.max_attempts,
                "retry_backoff_ms": self.dispatch.retry_backoff_ms,
            },
            "forecast": { "base_url": self.forecast.base_url, "timeout_secs": self.forecast.timeout_secs },
            "whatsapp": {
                "from": self.whatsapp.from,
                "configured": self.whatsapp.is_configured(),
            },
            "webhook": {
                "configured": self.webhook.is_configured(),
                "custom_headers": self.webhook.headers.is_some(),
            },
            "postgres": {
                "host": self.postgres.host,
                "port": self.postgres.port,
                "database": self.postgres.database,
                "configured": self.postgres.is_configured(),
            },
            "server": { "host": self.server.host, "port": self.server.port },
        })
    }
}

// ── Schedule ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// 5- or 6-field cron expression.
    pub cron: String,
    /// IANA timezone name. Also the reference timezone for "same day" dedup.
    pub timezone: String,
}

impl ScheduleConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            cron: profiled_env_or(p, "ALERT_SCHEDULE", "0 7 * * *"),
            timezone: profiled_env_or(p, "ALERT_TIMEZONE", "Asia/Kolkata"),
        }
    }

    pub fn timezone(&self) -> Result<Tz, AlertError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| AlertError::Config(format!("invalid ALERT_TIMEZONE '{}': {}", self.timezone, e)))
    }
}

// ── Dispatch ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub batch_size: usize,
    pub job_delay_ms: u64,
    pub batch_delay_ms: u64,
    /// 1 = no retry.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            job_delay_ms: 1000,
            batch_delay_ms: 5000,
            max_attempts: 1,
            retry_backoff_ms: 2000,
        }
    }
}

impl DispatchConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            batch_size: profiled_env_parse(p, "DISPATCH_BATCH_SIZE", d.batch_size),
            job_delay_ms: profiled_env_parse(p, "DISPATCH_JOB_DELAY_MS", d.job_delay_ms),
            batch_delay_ms: profiled_env_parse(p, "DISPATCH_BATCH_DELAY_MS", d.batch_delay_ms),
            max_attempts: profiled_env_parse(p, "DISPATCH_MAX_ATTEMPTS", d.max_attempts),
            retry_backoff_ms: profiled_env_parse(p, "DISPATCH_RETRY_BACKOFF_MS", d.retry_backoff_ms),
        }
    }

    pub fn job_delay(&self) -> Duration {
        Duration::from_millis(self.job_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

// ── Forecast provider ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl ForecastConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_url: profiled_env_or(p, "FORECAST_BASE_URL", "https://api.open-meteo.com/v1"),
            timeout_secs: profiled_env_parse(p, "FORECAST_TIMEOUT_SECS", 30),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── WhatsApp (Twilio) ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    /// Sender number, e.g. `whatsapp:+14155238886`.
    pub from: Option<String>,
    pub api_base: String,
}

impl WhatsAppConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            account_sid: profiled_env_opt(p, "TWILIO_ACCOUNT_SID"),
            auth_token: profiled_env_opt(p, "TWILIO_AUTH_TOKEN"),
            from: profiled_env_opt(p, "TWILIO_WHATSAPP_FROM"),
            api_base: profiled_env_or(p, "TWILIO_API_BASE", "https://api.twilio.com"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some() && self.from.is_some()
    }
}

// ── Webhook ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: Option<String>,
    /// JSON object of extra request headers, e.g. `{"Authorization": "Bearer ${GATEWAY_TOKEN}"}`.
    /// `${VAR}` references are resolved by the channel.
    pub headers: Option<String>,
}

impl WebhookConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_opt(p, "NOTIFY_WEBHOOK_URL"),
            headers: profiled_env_opt(p, "NOTIFY_WEBHOOK_HEADERS"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Parsed `NOTIFY_WEBHOOK_HEADERS`; empty when unset.
    pub fn headers(&self) -> Result<HashMap<String, String>, AlertError> {
        match &self.headers {
            None => Ok(HashMap::new()),
            Some(raw) => serde_json::from_str(raw).map_err(|e| {
                AlertError::Config(format!("NOTIFY_WEBHOOK_HEADERS must be a JSON object of strings: {e}"))
            }),
        }
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_parse(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "rainalert"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "prefer"),
            max_connections: profiled_env_parse(p, "PG_MAX_CONNECTIONS", 5),
        }
    }

    pub fn connection_string(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_parse(p, "PORT", 8080),
        }
    }
}

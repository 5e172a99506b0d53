use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use rainalert_alerts::SubscriptionStore;
use rainalert_core::config::PostgresConfig;
use rainalert_core::{AlertError, AlertWindow, LanguagePreference, Location, SubscriberId, Subscription};

/// Create a PostgreSQL connection pool and run migrations.
pub async fn init_pg_pool(config: &PostgresConfig) -> anyhow::Result<PgPool> {
    if !config.is_configured() {
        anyhow::bail!("PG_USERNAME not configured; set PostgreSQL settings or pass --subscriptions <file>");
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.connection_string())
        .await
        .with_context(|| format!("connecting to PostgreSQL at {}:{}", config.host, config.port))?;
    info!("PostgreSQL connected: {}", config.host);

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("running database migrations")?;
    info!("Database migrations applied successfully");

    Ok(pool)
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    destination: String,
    latitude: f64,
    longitude: f64,
    location_name: Option<String>,
    lookahead_days: i16,
    threshold_mm: f64,
    language: String,
    active: bool,
    last_notified: Option<DateTime<Utc>>,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        let language: LanguagePreference = row.language.parse().unwrap_or_else(|e| {
            warn!(subscriber_id = %row.id, error = %e, "unknown language in row, using default");
            LanguagePreference::default()
        });
        Subscription {
            // Out-of-range values become 0 so validation rejects the row at evaluation time.
            window: AlertWindow {
                lookahead_days: u8::try_from(row.lookahead_days).unwrap_or(0),
                threshold_mm: row.threshold_mm,
            },
            id: SubscriberId::new(row.id),
            destination: row.destination,
            location: Location {
                latitude: row.latitude,
                longitude: row.longitude,
                name: row.location_name,
            },
            language,
            active: row.active,
            last_notified: row.last_notified,
        }
    }
}

/// Subscriptions in the `rain_alert_subscriptions` table.
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn list_active(&self) -> Result<Vec<Subscription>, AlertError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(
            "SELECT id, destination, latitude, longitude, location_name, lookahead_days, \
             threshold_mm, language, active, last_notified \
             FROM rain_alert_subscriptions \
             WHERE active \
             ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AlertError::Store(format!("listing active subscriptions: {e}")))?;

        Ok(rows.into_iter().map(Subscription::from).collect())
    }

    async fn mark_notified(&self, id: &SubscriberId, at: DateTime<Utc>) -> Result<(), AlertError> {
        let result = sqlx::query("UPDATE rain_alert_subscriptions SET last_notified = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| AlertError::Store(format!("updating last_notified for {id}: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AlertError::Store(format!("subscription {id} not found")));
        }
        Ok(())
    }
}

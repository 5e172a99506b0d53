mod api;
mod cli;
mod db;
mod router;
mod state;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Days, Utc};
use clap::Parser;
use tracing::{info, warn};

use rainalert_alerts::{
    AlertPipeline, AlertScheduler, BatchDispatcher, DedupFilter, Evaluator, FixedIntervalPacer, MemoryStore,
    StatsAggregator, SubscriptionStore,
};
use rainalert_core::{Config, LanguagePreference, Location, Prediction};
use rainalert_forecast::OpenMeteoClient;
use rainalert_notify::{LogChannel, MessageRenderer, NotificationChannel, WebhookChannel, WhatsAppChannel};

use crate::cli::{CliArgs, Command};
use crate::db::PgSubscriptionStore;

fn load_config() -> Config {
    rainalert_core::config::load_dotenv();
    Config::from_env()
}

/// Dry run → log channel; otherwise WhatsApp if configured, then webhook.
fn build_channel(config: &Config, dry_run: bool) -> anyhow::Result<Arc<dyn NotificationChannel>> {
    if dry_run {
        info!("Dry run: alert messages will be logged, not sent");
        return Ok(Arc::new(LogChannel::new()));
    }
    if config.whatsapp.is_configured() {
        return Ok(Arc::new(WhatsAppChannel::from_config(&config.whatsapp)?));
    }
    if let Some(url) = &config.webhook.url {
        return Ok(Arc::new(WebhookChannel::new(url, config.webhook.headers()?)?));
    }
    anyhow::bail!("No delivery channel configured: set TWILIO_* or NOTIFY_WEBHOOK_URL, or pass --dry-run")
}

async fn build_store(config: &Config, subscriptions: Option<&Path>) -> anyhow::Result<Arc<dyn SubscriptionStore>> {
    match subscriptions {
        Some(path) => Ok(Arc::new(MemoryStore::from_json_file(path)?)),
        None => {
            let pool = db::init_pg_pool(&config.postgres).await?;
            Ok(Arc::new(PgSubscriptionStore::new(pool)))
        }
    }
}

/// Wire the pipeline and wrap it in a scheduler. Nothing is started.
async fn build_scheduler(config: &Config, args: &CliArgs) -> anyhow::Result<(Arc<AlertScheduler>, String)> {
    config.validate()?;
    let tz = config.schedule.timezone()?;

    let forecast = Arc::new(OpenMeteoClient::new(&config.forecast)?);
    let renderer = Arc::new(MessageRenderer::new()?);
    let channel = build_channel(config, args.dry_run)?;
    let channel_name = channel.channel_name().to_string();
    let store = build_store(config, args.subscriptions.as_deref()).await?;
    let pacer = Arc::new(FixedIntervalPacer::new(
        config.dispatch.job_delay(),
        config.dispatch.batch_delay(),
    ));

    let pipeline = AlertPipeline::new(
        store.clone(),
        Evaluator::new(forecast, renderer),
        DedupFilter::new(tz),
        BatchDispatcher::from_config(&config.dispatch, channel, store, pacer),
        Arc::new(StatsAggregator::new()),
    );
    let scheduler = AlertScheduler::new(Arc::new(pipeline), &config.schedule.cron, tz)?;

    info!(channel = %channel_name, "Alert pipeline ready");
    Ok((Arc::new(scheduler), channel_name))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn serve(config: &Config, args: &CliArgs, paused: bool) -> anyhow::Result<()> {
    config.log_summary();
    let (scheduler, channel) = build_scheduler(config, args).await?;

    if paused {
        info!("Scheduler paused; POST /alerts/start to enable daily runs");
    } else {
        scheduler.start();
    }

    let state = Arc::new(state::AppState {
        scheduler: scheduler.clone(),
        channel,
        config_summary: config.redacted_summary(),
    });
    let app = router::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Waits for an in-flight scheduled run to finish.
    scheduler.shutdown().await;
    Ok(())
}

async fn trigger(config: &Config, args: &CliArgs) -> anyhow::Result<()> {
    config.log_summary();
    let (scheduler, _) = build_scheduler(config, args).await?;
    let report = scheduler.trigger_now().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Three days of sample weather starting today.
fn sample_predictions() -> Vec<Prediction> {
    let today = Utc::now().date_naive();
    [(0u32, 3.2, 60.0), (1, 12.4, 85.0), (2, 27.0, 95.0)]
        .into_iter()
        .map(|(offset, rain, probability)| Prediction {
            date: today.checked_add_days(Days::new(u64::from(offset))).unwrap_or(today),
            days_from_now: offset,
            rain_volume_mm: rain,
            precipitation_probability: probability,
            temp_min_c: 22.0,
            temp_max_c: 29.0,
            humidity_pct: 88.0,
            wind_speed_kmh: 14.0,
        })
        .collect()
}

fn render(language: LanguagePreference, location: &str) -> anyhow::Result<()> {
    let renderer = MessageRenderer::new()?;
    let location = Location {
        latitude: 19.9975,
        longitude: 73.7898,
        name: Some(location.to_string()),
    };
    let message = renderer.render(&sample_predictions(), &location, language)?;
    println!("{message}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = load_config();

    match &args.command {
        Command::Serve { paused } => serve(&config, &args, *paused).await?,
        Command::Trigger => trigger(&config, &args).await?,
        Command::Render { language, location } => render(*language, location)?,
    }

    Ok(())
}

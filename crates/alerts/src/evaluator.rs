//! Per-subscription forecast evaluation.

use std::sync::Arc;

use rainalert_core::{NotificationJob, Subscription};
use rainalert_forecast::ForecastClient;
use rainalert_notify::MessageRenderer;
use tracing::{debug, error, warn};

/// What evaluating one subscription produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Rain reaches the threshold; a message is owed (before dedup).
    Owed(NotificationJob),
    /// Forecast is below the threshold.
    NotOwed,
    /// The subscription could not be evaluated this run.
    Failed { kind: FailureKind, error: String },
}

/// Why an evaluation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The subscription itself is invalid; skipped without a forecast call.
    Invalid,
    /// The forecast provider failed.
    Forecast,
    Render,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Invalid => "invalid",
            FailureKind::Forecast => "forecast",
            FailureKind::Render => "render",
        }
    }
}

pub struct Evaluator {
    forecast: Arc<dyn ForecastClient>,
    renderer: Arc<MessageRenderer>,
}

impl Evaluator {
    pub fn new(forecast: Arc<dyn ForecastClient>, renderer: Arc<MessageRenderer>) -> Self {
        Self { forecast, renderer }
    }

    /// Never fails: provider, validation and rendering errors are logged
    /// against the subscriber and come back as [`Evaluation::Failed`].
    pub async fn evaluate(&self, subscription: &Subscription) -> Evaluation {
        let subscriber_id = subscription.id.as_str();

        if let Err(e) = subscription.validate() {
            warn!(subscriber_id, kind = FailureKind::Invalid.as_str(), error = %e, "skipping invalid subscription");
            return Evaluation::Failed {
                kind: FailureKind::Invalid,
                error: e.to_string(),
            };
        }

        let outcome = match self
            .forecast
            .evaluate(
                subscription.location.latitude,
                subscription.location.longitude,
                subscription.window.lookahead_days,
                subscription.window.threshold_mm,
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(subscriber_id, kind = FailureKind::Forecast.as_str(), error = %e, "forecast evaluation failed");
                return Evaluation::Failed {
                    kind: FailureKind::Forecast,
                    error: e.to_string(),
                };
            }
        };

        if !outcome.has_qualifying_prediction || outcome.predictions.is_empty() {
            debug!(subscriber_id, "no qualifying rain");
            return Evaluation::NotOwed;
        }

        match self.renderer.render(
            &outcome.predictions,
            &subscription.location,
            subscription.language,
        ) {
            Ok(message) => {
                debug!(subscriber_id, days = outcome.predictions.len(), "alert owed");
                Evaluation::Owed(NotificationJob {
                    subscriber_id: subscription.id.clone(),
                    destination: subscription.destination.clone(),
                    message,
                })
            }
            Err(e) => {
                error!(subscriber_id, kind = FailureKind::Render.as_str(), error = %e, "alert message rendering failed");
                Evaluation::Failed {
                    kind: FailureKind::Render,
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rainalert_core::{AlertWindow, ForecastOutcome, LanguagePreference, Location, Prediction};
    use rainalert_forecast::ForecastError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubForecast {
        calls: Arc<AtomicUsize>,
        rain_mm: Option<f64>,
    }

    #[async_trait::async_trait]
    impl ForecastClient for StubForecast {
        async fn evaluate(&self, _lat: f64, _lon: f64, _days: u8, threshold: f64) -> Result<ForecastOutcome, ForecastError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let Some(rain) = self.rain_mm else {
                return Err(ForecastError::Provider("HTTP 503".into()));
            };
            if rain < threshold {
                return Ok(ForecastOutcome::dry());
            }
            Ok(ForecastOutcome::from_predictions(vec![Prediction {
                date: NaiveDate::from_ymd_opt(2026, 7, 16).unwrap(),
                days_from_now: 2,
                rain_volume_mm: rain,
                precipitation_probability: 70.0,
                temp_min_c: 22.0,
                temp_max_c: 29.0,
                humidity_pct: 85.0,
                wind_speed_kmh: 12.0,
            }]))
        }
    }

    fn evaluator(rain_mm: Option<f64>) -> (Evaluator, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let forecast = Arc::new(StubForecast { calls: calls.clone(), rain_mm });
        let renderer = Arc::new(MessageRenderer::new().unwrap());
        (Evaluator::new(forecast, renderer), calls)
    }

    fn subscription() -> Subscription {
        Subscription {
            id: "s-1".into(),
            destination: "+919812345678".into(),
            location: Location {
                latitude: 19.99,
                longitude: 73.79,
                name: Some("Nashik".into()),
            },
            window: AlertWindow {
                lookahead_days: 4,
                threshold_mm: 2.5,
            },
            language: LanguagePreference::English,
            active: true,
            last_notified: None,
        }
    }

    #[tokio::test]
    async fn qualifying_rain_produces_job() {
        let (evaluator, _) = evaluator(Some(4.0));
        match evaluator.evaluate(&subscription()).await {
            Evaluation::Owed(job) => {
                assert_eq!(job.subscriber_id.as_str(), "s-1");
                assert_eq!(job.destination, "+919812345678");
                assert!(job.message.contains("4.0 mm rain"));
                assert!(job.message.contains("in 2 days"));
            }
            other => panic!("expected Owed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn light_rain_is_not_owed() {
        let (evaluator, _) = evaluator(Some(1.0));
        assert_eq!(evaluator.evaluate(&subscription()).await, Evaluation::NotOwed);
    }

    #[tokio::test]
    async fn provider_error_is_a_forecast_failure() {
        let (evaluator, calls) = evaluator(None);
        match evaluator.evaluate(&subscription()).await {
            Evaluation::Failed { kind, error } => {
                assert_eq!(kind, FailureKind::Forecast);
                assert!(error.contains("HTTP 503"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_subscription_skips_forecast_call() {
        let (evaluator, calls) = evaluator(Some(10.0));
        let mut sub = subscription();
        sub.window.lookahead_days = 9;
        assert!(matches!(
            evaluator.evaluate(&sub).await,
            Evaluation::Failed {
                kind: FailureKind::Invalid,
                ..
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

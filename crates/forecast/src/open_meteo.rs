//! Open-Meteo daily forecast client.

use chrono::NaiveDate;
use rainalert_core::config::ForecastConfig;
use rainalert_core::{ForecastOutcome, Prediction};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::traits::{ForecastClient, ForecastError};

const DAILY_FIELDS: &str = "precipitation_sum,precipitation_probability_max,temperature_2m_max,\
temperature_2m_min,relative_humidity_2m_mean,wind_speed_10m_max";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    daily: Option<DailyData>,
}

/// Parallel arrays, one entry per day. Open-Meteo sends `null` for gaps.
#[derive(Debug, Default, Deserialize)]
struct DailyData {
    time: Vec<String>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m_mean: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
}

fn value_at(series: &[Option<f64>], i: usize) -> f64 {
    series.get(i).copied().flatten().unwrap_or(0.0)
}

impl DailyData {
    /// Days whose precipitation reaches `threshold_mm`, in forecast order.
    fn qualifying(&self, threshold_mm: f64) -> Result<Vec<Prediction>, ForecastError> {
        let mut predictions = Vec::new();

        for (i, day) in self.time.iter().enumerate() {
            let rain = value_at(&self.precipitation_sum, i);
            if rain < threshold_mm {
                continue;
            }

            let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map_err(|e| ForecastError::Parse(format!("invalid date '{day}': {e}")))?;

            predictions.push(Prediction {
                date,
                days_from_now: i as u32,
                rain_volume_mm: rain,
                precipitation_probability: value_at(&self.precipitation_probability_max, i),
                temp_min_c: value_at(&self.temperature_2m_min, i),
                temp_max_c: value_at(&self.temperature_2m_max, i),
                humidity_pct: value_at(&self.relative_humidity_2m_mean, i),
                wind_speed_kmh: value_at(&self.wind_speed_10m_max, i),
            });
        }

        Ok(predictions)
    }
}

/// Open-Meteo HTTP client implementation
#[derive(Debug)]
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
}

impl OpenMeteoClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: &ForecastConfig) -> Result<Self, ForecastError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ForecastError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ForecastError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(ForecastError::InvalidCoordinates { latitude, longitude });
        }
        Ok(())
    }

    async fn fetch_daily(&self, latitude: f64, longitude: f64, days: u8) -> Result<DailyData, ForecastError> {
        let url = format!("{}/forecast", self.base_url);
        debug!(url = %url, days, "Fetching daily forecast");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("timezone", "auto".to_string()),
                ("forecast_days", days.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ForecastError::Request(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ForecastError::RateLimited);
        }
        if status.is_server_error() {
            return Err(ForecastError::Provider(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(ForecastError::Request(format!("HTTP {status}: {reason}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ForecastError::Parse(e.to_string()))?;

        api_response
            .daily
            .ok_or_else(|| ForecastError::Parse("no daily data in response".to_string()))
    }
}

#[async_trait::async_trait]
impl ForecastClient for OpenMeteoClient {
    #[instrument(skip(self), fields(lat = %latitude, lon = %longitude))]
    async fn evaluate(
        &self,
        latitude: f64,
        longitude: f64,
        lookahead_days: u8,
        threshold_mm: f64,
    ) -> Result<ForecastOutcome, ForecastError> {
        Self::validate_coordinates(latitude, longitude)?;

        // Day 0 is today, so a lookahead of N needs N + 1 days.
        let days = lookahead_days.saturating_add(1).min(16);
        let daily = self.fetch_daily(latitude, longitude, days).await?;
        let predictions = daily.qualifying(threshold_mm)?;

        debug!(qualifying = predictions.len(), "Forecast evaluated");
        Ok(ForecastOutcome::from_predictions(predictions))
    }
}

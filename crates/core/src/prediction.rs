use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One forecast day that met a subscriber's rain threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub date: NaiveDate,
    /// 0 = today in the forecast location's timezone.
    pub days_from_now: u32,
    /// Rain volume in millimetres.
    pub rain_volume_mm: f64,
    /// Precipitation probability in percent (0-100).
    pub precipitation_probability: f64,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    /// Relative humidity in percent.
    pub humidity_pct: f64,
    pub wind_speed_kmh: f64,
}

/// What the forecast provider says about one location and window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutcome {
    pub has_qualifying_prediction: bool,
    pub predictions: Vec<Prediction>,
}

impl ForecastOutcome {
    pub fn from_predictions(predictions: Vec<Prediction>) -> Self {
        Self {
            has_qualifying_prediction: !predictions.is_empty(),
            predictions,
        }
    }

    pub fn dry() -> Self {
        Self::default()
    }
}

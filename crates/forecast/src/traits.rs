use rainalert_core::ForecastOutcome;

/// Forecast provider errors. A failure is never reported as an empty outcome.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("Forecast request failed: {0}")]
    Request(String),

    #[error("Forecast provider rate limit exceeded")]
    RateLimited,

    #[error("Forecast provider unavailable: {0}")]
    Provider(String),

    #[error("Forecast response could not be parsed: {0}")]
    Parse(String),

    #[error("Invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

#[async_trait::async_trait]
pub trait ForecastClient: Send + Sync {
    /// Days from today through `lookahead_days` whose rain volume reaches
    /// `threshold_mm`.
    async fn evaluate(
        &self,
        latitude: f64,
        longitude: f64,
        lookahead_days: u8,
        threshold_mm: f64,
    ) -> Result<ForecastOutcome, ForecastError>;
}

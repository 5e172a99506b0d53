//! Forecast provider access for rain alerts.
//!
//! `ForecastClient` answers one question per subscription: which days in
//! the lookahead window reach the rain threshold. `OpenMeteoClient` is the
//! HTTP implementation.

pub mod open_meteo;
pub mod traits;

pub use open_meteo::OpenMeteoClient;
pub use traits::{ForecastClient, ForecastError};

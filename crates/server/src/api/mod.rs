//! Admin API endpoint modules.

mod alerts;
mod health;

use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub use alerts::{start, status, stop, trigger};
pub use health::health;

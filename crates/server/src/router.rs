//! HTTP router construction.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api;
use crate::state::AppState;

/// Build the admin router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/alerts/status", get(api::status))
        .route("/alerts/start", post(api::start))
        .route("/alerts/stop", post(api::stop))
        .route("/alerts/trigger", post(api::trigger))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

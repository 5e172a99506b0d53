//! Scheduler control: status, start, stop and manual trigger.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use rainalert_alerts::{RunReport, SchedulerStatus};
use rainalert_core::AlertError;

use crate::state::AppState;

use super::ErrorResponse;

#[derive(Serialize)]
pub struct ToggleResponse {
    /// Whether this call changed anything.
    pub changed: bool,
    pub status: SchedulerStatus,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status())
}

pub async fn start(State(state): State<Arc<AppState>>) -> Json<ToggleResponse> {
    let changed = state.scheduler.start();
    Json(ToggleResponse {
        changed,
        status: state.scheduler.status(),
    })
}

pub async fn stop(State(state): State<Arc<AppState>>) -> Json<ToggleResponse> {
    let changed = state.scheduler.stop();
    Json(ToggleResponse {
        changed,
        status: state.scheduler.status(),
    })
}

/// Run the pipeline now and return its report. 409 while a run is in flight.
pub async fn trigger(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RunReport>, (StatusCode, Json<ErrorResponse>)> {
    info!("manual alert run requested");
    match state.scheduler.trigger_now().await {
        Ok(report) => Ok(Json(report)),
        Err(AlertError::RunInProgress) => {
            warn!("manual alert run rejected: a run is already in progress");
            Err((
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: AlertError::RunInProgress.to_string(),
                }),
            ))
        }
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: e.to_string() }),
        )),
    }
}

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use orderflow_core::SanitizedConfig;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Registered courier agencies
#[derive(Serialize)]
pub struct CouriersResponse {
    pub agencies: Vec<String>,
}

pub async fn list_couriers(State(state): State<Arc<AppState>>) -> Json<CouriersResponse> {
    Json(CouriersResponse {
        agencies: state.engine().couriers().names(),
    })
}

/// Reconciliation scheduler status
#[derive(Serialize)]
pub struct SchedulerStatusResponse {
    pub running: bool,
    pub interval_secs: u64,
}

pub async fn scheduler_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatusResponse> {
    Json(SchedulerStatusResponse {
        running: state.reconciler().is_some_and(|r| r.is_running()),
        interval_secs: state.scheduler_interval_secs(),
    })
}

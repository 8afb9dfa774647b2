//! Health and metrics endpoints

use crate::{error::ApiResult, models::HealthResponse, state::AppState};
use axum::{extract::State, http::header, response::IntoResponse, Json};
use crm_rbac::RbacError;

/// Liveness probe
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Prometheus text exposition of the decision counters
pub async fn metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let body = state
        .metrics
        .render(state.uptime_seconds())
        .map_err(|e| RbacError::Internal(format!("Failed to encode metrics: {}", e)))?;

    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}

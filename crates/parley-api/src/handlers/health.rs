//! Health Check Handler

use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use parley_escrow::EscrowBackend;

use crate::dto::HealthResponse;
use crate::state::AppState;

/// Returns 200 while the service is running
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let now = Utc::now();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.ledger.backend().name().to_string(),
        uptime_seconds: (now - state.started_at).num_seconds(),
        timestamp: now,
    })
}

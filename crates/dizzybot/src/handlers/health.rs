use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    active_conversations: usize,
    queued_jobs: usize,
}

/// Liveness check, plain text
pub async fn liveness() -> &'static str {
    "OK"
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.started_at.elapsed().as_secs(),
            active_conversations: state.client.store().len(),
            queued_jobs: state.dispatcher.queued(),
        }),
    )
}

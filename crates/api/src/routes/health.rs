use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` while the worker runs, `degraded` otherwise.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub worker_running: bool,
    /// Ids waiting in the admission queue.
    pub queued: usize,
}

/// GET /health -- returns service and worker health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let worker_running = state.jobs.is_running().await;
    let status = if worker_running { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        worker_running,
        queued: state.jobs.queue().len(),
    })
}

/// GET /ping -- liveness probe.
async fn ping() -> &'static str {
    "pong\n"
}

/// Mount health routes (root level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ping", get(ping))
}

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the inference engine failed to start.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub engine_ready: bool,
    /// Why the engine failed to start; absent when it is ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_error: Option<String>,
}

/// GET /health -- returns service and engine health.
///
/// Always 200, so the server stays reachable while the engine is down.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = state.orchestrator.engine();
    let engine_ready = engine.is_ready();

    let status = if engine_ready { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        engine_ready,
        engine_error: engine.unavailable_reason().map(str::to_owned),
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

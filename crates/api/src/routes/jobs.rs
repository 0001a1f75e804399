use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Job routes, merged into `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(jobs::create_job))
        .route("/jobs/create", post(jobs::create_job_legacy))
        .route("/jobs/{id}", get(jobs::get_job))
}

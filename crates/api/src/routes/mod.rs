pub mod health;
pub mod jobs;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                 WebSocket job event stream (?job_id= filter)
///
/// /jobs               create (multipart)
/// /jobs/create        create (multipart, legacy path)
/// /jobs/{id}          get
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(jobs::router())
}

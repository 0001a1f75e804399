//! WebSocket stream of job events.
//!
//! Each connection subscribes to the event bus and receives every
//! [`JobEvent`] as a JSON text frame, optionally filtered to one job.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use motionweave_core::types::JobId;
use motionweave_pipeline::events::JobEvent;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Only forward events for this job.
    pub job_id: Option<String>,
}

/// GET /api/v1/ws -- upgrade to a job event stream.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let filter = query
        .job_id
        .as_deref()
        .map(str::parse::<JobId>)
        .transpose()
        .map_err(|_| AppError::BadRequest("job_id must be a UUID".into()))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, filter)))
}

/// Forward bus events to the socket until either side closes.
async fn handle_socket(socket: WebSocket, state: AppState, filter: Option<JobId>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let mut events = state.event_bus.subscribe();
    tracing::info!(conn_id = %conn_id, job_filter = ?filter, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    if !matches_filter(&event, filter) {
                        continue;
                    }
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize job event");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        tracing::debug!(conn_id = %conn_id, "WebSocket sink closed");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(conn_id = %conn_id, skipped, "WebSocket client lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
        }
    }

    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

fn matches_filter(event: &JobEvent, filter: Option<JobId>) -> bool {
    filter.map_or(true, |id| event.job.id == id)
}

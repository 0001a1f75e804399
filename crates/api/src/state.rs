use std::sync::Arc;

use motionweave_pipeline::events::EventBus;
use motionweave_pipeline::orchestrator::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Job submission, status lookups and the engine handle.
    pub orchestrator: Arc<Orchestrator>,
    /// Job event stream forwarded to WebSocket clients.
    pub event_bus: Arc<EventBus>,
}

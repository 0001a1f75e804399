//! Inference capabilities over an HTTP model server and local FFmpeg.

pub mod api;
pub mod backend;
pub mod codec;
pub mod ffmpeg;

use std::sync::Arc;
use std::time::Duration;

use motionweave_pipeline::capabilities::FaceRestorer;
use motionweave_pipeline::engine::{Engine, EngineHandle, EngineParts};

use crate::api::InferenceApi;
use crate::backend::{FfmpegMedia, ModelServer};

/// How to reach the model server.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub api_url: String,
    pub request_timeout: Duration,
    /// Wire the restorer into the engine.
    pub face_restoration: bool,
}

/// Build the engine, probing the model server and FFmpeg first.
///
/// Never fails: an unreachable server or missing binary yields
/// [`EngineHandle::Unavailable`] so the API can still start and report it.
pub async fn connect(config: &InferenceConfig) -> EngineHandle {
    let api = match InferenceApi::new(config.api_url.clone(), config.request_timeout) {
        Ok(api) => Arc::new(api),
        Err(e) => return unavailable(config, format!("cannot build HTTP client: {e}")),
    };

    let health = match api.health().await {
        Ok(health) => health,
        Err(e) => {
            return unavailable(config, format!("model server at {} is not healthy: {e}", config.api_url))
        }
    };
    if let Err(e) = ffmpeg::check_available().await {
        return unavailable(config, format!("ffmpeg unavailable: {e}"));
    }

    let server = Arc::new(ModelServer::new(api));
    let media = Arc::new(FfmpegMedia);
    let engine = Engine::new(EngineParts {
        source: media.clone(),
        pose: server.clone(),
        generator: server.clone(),
        restorer: config
            .face_restoration
            .then(|| server as Arc<dyn FaceRestorer>),
        exporter: media,
    });

    tracing::info!(
        api_url = %config.api_url,
        device = health.device.as_deref().unwrap_or("unknown"),
        face_restoration = config.face_restoration,
        "Inference engine ready",
    );
    EngineHandle::ready(engine)
}

fn unavailable(config: &InferenceConfig, reason: String) -> EngineHandle {
    tracing::error!(api_url = %config.api_url, reason = %reason, "Inference engine unavailable");
    EngineHandle::unavailable(reason)
}

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use motionweave_core::frame::Frame;
use motionweave_core::job::Job;
use motionweave_core::types::JobId;
use motionweave_pipeline::capabilities::{
    ExportError, ExtractionError, FrameGenerator, GenerationError, GenerationRequest,
    PoseExtractor, VideoExporter, VideoSource,
};
use motionweave_pipeline::engine::{Engine, EngineHandle, EngineParts};
use motionweave_pipeline::events::EventBus;
use motionweave_pipeline::orchestrator::{Orchestrator, OutputLayout};
use motionweave_pipeline::queue::{JobQueue, JobReceiver, QueueWorker};
use motionweave_pipeline::settings::PipelineSettings;
use motionweave_pipeline::store::JobStore;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use motionweave_api::app::build_app;
use motionweave_api::config::{ServerConfig, DEFAULT_MAX_UPLOAD_BYTES};
use motionweave_api::state::AppState;

pub const PUBLIC_BASE_URL: &str = "http://testserver";

/// Bytes the fake exporter writes as the "video".
pub const FAKE_VIDEO: &[u8] = b"not-really-an-mp4";

/// Small config so generated frames stay tiny.
pub const SMALL_CONFIG: &str = r#"{"resolution": "8x8", "duration": 1}"#;

// ---------------------------------------------------------------------------
// Fake engine
// ---------------------------------------------------------------------------

/// Decodes every video to 20 small frames and writes a marker file on export.
struct FakeMedia;

#[async_trait]
impl VideoSource for FakeMedia {
    async fn load_image(&self, _path: &Path) -> Result<Frame, ExtractionError> {
        Ok(Frame::solid(16, 16, [200, 150, 100]))
    }

    async fn decode_video(&self, _path: &Path, max_frames: usize) -> Result<Vec<Frame>, ExtractionError> {
        Ok((0..20u8)
            .take(max_frames)
            .map(|i| Frame::solid(8, 8, [i, i, i]))
            .collect())
    }
}

#[async_trait]
impl VideoExporter for FakeMedia {
    async fn export_video(&self, frames: &[Frame], path: &Path, _fps: u32) -> Result<(), ExportError> {
        assert!(!frames.is_empty());
        tokio::fs::write(path, FAKE_VIDEO)
            .await
            .map_err(|e| ExportError(e.to_string()))
    }
}

struct FakeModel;

#[async_trait]
impl PoseExtractor for FakeModel {
    async fn extract_pose(&self, frame: &Frame) -> Result<Frame, ExtractionError> {
        Ok(frame.clone())
    }
}

#[async_trait]
impl FrameGenerator for FakeModel {
    async fn generate_frames(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<Vec<Frame>, GenerationError> {
        let (w, h) = (request.params.width, request.params.height);
        Ok(request
            .poses
            .iter()
            .map(|p| Frame::solid(w, h, [p.index as u8, 0, 0]))
            .collect())
    }
}

fn fake_engine() -> EngineHandle {
    let media = Arc::new(FakeMedia);
    let model = Arc::new(FakeModel);
    EngineHandle::ready(Engine::new(EngineParts {
        source: media.clone(),
        pose: model.clone(),
        generator: model,
        restorer: None,
        exporter: media,
    }))
}

// ---------------------------------------------------------------------------
// Test application
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` rooted in `dir`.
pub fn test_config(dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        upload_dir: dir.join("uploads"),
        output_dir: dir.join("outputs"),
        public_base_url: PUBLIC_BASE_URL.to_string(),
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        inference_url: "http://127.0.0.1:9".to_string(),
        inference_timeout_secs: 1,
    }
}

/// The full router over an in-memory store and a fake engine.
///
/// The queue worker is not started until [`TestApp::start_worker`], so
/// freshly created jobs stay `queued` unless a test opts in.
pub struct TestApp {
    pub app: Router,
    pub orchestrator: Arc<Orchestrator>,
    pub events: Arc<EventBus>,
    pub dir: TempDir,
    pub cancel: CancellationToken,
    receiver: Option<JobReceiver>,
}

impl TestApp {
    pub fn new(engine_ready: bool) -> Self {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(&config.output_dir).unwrap();

        let engine = if engine_ready {
            fake_engine()
        } else {
            EngineHandle::unavailable("model server at http://127.0.0.1:9 is not healthy")
        };

        let events = Arc::new(EventBus::default());
        let store = Arc::new(JobStore::new(Arc::clone(&events)));
        let (queue, receiver) = JobQueue::channel();
        let orchestrator = Arc::new(Orchestrator::new(
            store,
            engine,
            queue,
            PipelineSettings::default(),
            OutputLayout::new(config.output_dir.clone(), PUBLIC_BASE_URL),
        ));

        let app = build_app(AppState {
            config: Arc::new(config),
            orchestrator: Arc::clone(&orchestrator),
            event_bus: Arc::clone(&events),
        });

        Self {
            app,
            orchestrator,
            events,
            dir,
            cancel: CancellationToken::new(),
            receiver: Some(receiver),
        }
    }

    pub fn start_worker(&mut self) {
        let receiver = self.receiver.take().expect("worker already started");
        QueueWorker::new(Arc::clone(&self.orchestrator), receiver).spawn(self.cancel.clone());
    }

    /// Poll until the job is completed or failed.
    pub async fn wait_terminal(&self, id: JobId) -> Job {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let job = self.orchestrator.status(id).await.unwrap();
                if job.status.is_terminal() {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("job did not finish in time")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// ---------------------------------------------------------------------------
// Multipart bodies
// ---------------------------------------------------------------------------

const BOUNDARY: &str = "----motionweave-test-boundary";

/// Hand-built `multipart/form-data` body.
#[derive(Default)]
pub struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, file_name: &str, content: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(content);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
        self
    }

    /// Both required inputs with placeholder content.
    pub fn with_inputs(self) -> Self {
        self.file("character_image", "hero.png", b"png-bytes")
            .file("reference_video", "dance.mp4", b"mp4-bytes")
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.bytes
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.bytes))
            .unwrap()
    }
}

/// POST a job and return the response.
pub async fn create_job(app: &Router, body: MultipartBody) -> Response<Body> {
    send(app, body.into_request("/api/v1/jobs")).await
}

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use motionweave_core::frame::Frame;
use motionweave_core::job::{GenerationConfig, Job, JobAssets};
use motionweave_core::types::JobId;
use motionweave_pipeline::capabilities::{
    ExportError, ExtractionError, FaceRestorer, FrameGenerator, GenerationError,
    GenerationRequest, PoseExtractor, RestorationError, VideoExporter, VideoSource,
};
use motionweave_pipeline::engine::{Engine, EngineHandle, EngineParts};
use motionweave_pipeline::events::EventBus;
use motionweave_pipeline::orchestrator::{Orchestrator, OutputLayout};
use motionweave_pipeline::queue::{JobQueue, JobReceiver, QueueWorker};
use motionweave_pipeline::settings::PipelineSettings;
use motionweave_pipeline::store::JobStore;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Frame size used by every fake; matches [`test_config`].
pub const SIZE: u32 = 8;

/// Colour returned by the fake restorer, distinct from any generated frame.
pub const RESTORED_RGB: [u8; 3] = [255, 0, 255];

// ---------------------------------------------------------------------------
// Fake capabilities
// ---------------------------------------------------------------------------

/// Decodes a driving video of `frames` solid frames whose red channel is
/// the frame index.
pub struct FakeSource {
    pub frames: usize,
    /// Frame cap passed to the last `decode_video` call.
    pub requested: Mutex<Option<usize>>,
}

impl FakeSource {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            requested: Mutex::new(None),
        }
    }

    pub fn requested(&self) -> Option<usize> {
        *self.requested.lock().unwrap()
    }
}

#[async_trait]
impl VideoSource for FakeSource {
    async fn load_image(&self, _path: &Path) -> Result<Frame, ExtractionError> {
        Ok(Frame::solid(SIZE * 2, SIZE * 2, [10, 20, 30]))
    }

    async fn decode_video(&self, _path: &Path, max_frames: usize) -> Result<Vec<Frame>, ExtractionError> {
        *self.requested.lock().unwrap() = Some(max_frames);
        Ok((0..self.frames.min(max_frames))
            .map(|i| Frame::solid(SIZE, SIZE, [i as u8, 0, 0]))
            .collect())
    }
}

/// Pose map is the input frame itself.
#[derive(Default)]
pub struct FakePose {
    /// Source frame index (red channel) that fails.
    pub fail_on_frame: Option<u8>,
}

#[async_trait]
impl PoseExtractor for FakePose {
    async fn extract_pose(&self, frame: &Frame) -> Result<Frame, ExtractionError> {
        if self.fail_on_frame == Some(tag(frame)) {
            return Err(ExtractionError("no person detected".into()));
        }
        Ok(frame.clone())
    }
}

/// What the generator saw for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationCall {
    pub seed: u64,
    pub length: usize,
    pub pose_indices: Vec<usize>,
}

/// Emits one frame per pose whose red channel is the pose's source index,
/// so overlapping chunks agree on shared frames.
#[derive(Default)]
pub struct FakeGenerator {
    /// Zero-based call number that fails.
    pub fail_on_call: Option<usize>,
    pub delay: Option<Duration>,
    pub calls: Mutex<Vec<GenerationCall>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeGenerator {
    pub fn calls(&self) -> Vec<GenerationCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameGenerator for FakeGenerator {
    async fn generate_frames(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<Vec<Frame>, GenerationError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(GenerationCall {
                seed: request.seed,
                length: request.length,
                pose_indices: request.poses.iter().map(|p| p.index).collect(),
            });
            calls.len() - 1
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on_call == Some(call_number) {
            return Err(GenerationError("model crashed".into()));
        }

        let (w, h) = (request.params.width, request.params.height);
        Ok(request
            .poses
            .iter()
            .map(|p| Frame::solid(w, h, [p.index as u8, 0, 0]))
            .collect())
    }
}

#[derive(Default)]
pub struct FakeRestorer {
    pub fail: bool,
    /// Per-frame delay.
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl FaceRestorer for FakeRestorer {
    async fn restore_face(&self, frame: &Frame) -> Result<Frame, RestorationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(RestorationError("restorer out of memory".into()));
        }
        Ok(Frame::solid(frame.width(), frame.height(), RESTORED_RGB))
    }
}

/// Records what would have been written.
#[derive(Default)]
pub struct FakeExporter {
    pub fail: bool,
    pub exported: Mutex<Option<(Vec<Frame>, PathBuf, u32)>>,
    pub calls: AtomicUsize,
}

impl FakeExporter {
    pub fn frames(&self) -> Option<Vec<Frame>> {
        self.exported
            .lock()
            .unwrap()
            .as_ref()
            .map(|(frames, _, _)| frames.clone())
    }
}

#[async_trait]
impl VideoExporter for FakeExporter {
    async fn export_video(&self, frames: &[Frame], path: &Path, fps: u32) -> Result<(), ExportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ExportError("disk full".into()));
        }
        *self.exported.lock().unwrap() = Some((frames.to_vec(), path.to_path_buf(), fps));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub events: Arc<EventBus>,
    pub source: Arc<FakeSource>,
    pub generator: Arc<FakeGenerator>,
    pub restorer: Arc<FakeRestorer>,
    pub exporter: Arc<FakeExporter>,
    pub dir: TempDir,
    receiver: Option<JobReceiver>,
}

pub struct HarnessOptions {
    pub source_frames: usize,
    pub pose: FakePose,
    pub generator: FakeGenerator,
    pub restorer: FakeRestorer,
    pub exporter: FakeExporter,
    pub settings: PipelineSettings,
    pub engine_unavailable: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            source_frames: 40,
            pose: FakePose::default(),
            generator: FakeGenerator::default(),
            restorer: FakeRestorer::default(),
            exporter: FakeExporter::default(),
            settings: PipelineSettings::default(),
            engine_unavailable: false,
        }
    }
}

pub fn harness(options: HarnessOptions) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeSource::new(options.source_frames));
    let generator = Arc::new(options.generator);
    let restorer = Arc::new(options.restorer);
    let exporter = Arc::new(options.exporter);

    let engine = if options.engine_unavailable {
        EngineHandle::unavailable("model server unreachable")
    } else {
        EngineHandle::ready(Engine::new(EngineParts {
            source: source.clone(),
            pose: Arc::new(options.pose),
            generator: generator.clone(),
            restorer: Some(restorer.clone()),
            exporter: exporter.clone(),
        }))
    };

    let events = Arc::new(EventBus::default());
    let store = Arc::new(JobStore::new(Arc::clone(&events)));
    let (queue, receiver) = JobQueue::channel();
    let output = OutputLayout::new(dir.path().join("outputs"), "http://test.local/");

    let orchestrator = Arc::new(Orchestrator::new(
        store,
        engine,
        queue,
        options.settings,
        output,
    ));

    Harness {
        orchestrator,
        events,
        source,
        generator,
        restorer,
        exporter,
        dir,
        receiver: Some(receiver),
    }
}

impl Harness {
    /// Write placeholder input files and return their paths.
    pub fn assets(&self) -> JobAssets {
        let reference_image = self.dir.path().join("char.png");
        let driving_video = self.dir.path().join("ref.mp4");
        std::fs::write(&reference_image, b"png").unwrap();
        std::fs::write(&driving_video, b"mp4").unwrap();
        JobAssets {
            reference_image,
            driving_video,
            audio: None,
        }
    }

    pub async fn submit(&self) -> Job {
        self.orchestrator
            .submit(test_config(), self.assets())
            .await
            .unwrap()
    }

    /// Start the queue worker. Can be called once.
    pub fn spawn_worker(&mut self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let receiver = self.receiver.take().expect("worker already spawned");
        QueueWorker::new(Arc::clone(&self.orchestrator), receiver).spawn(cancel)
    }

    /// Poll until the job is terminal.
    pub async fn wait_terminal(&self, id: JobId) -> Job {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let job = self.orchestrator.status(id).await.unwrap();
                if job.status.is_terminal() {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job did not finish in time")
    }
}

pub fn test_config() -> GenerationConfig {
    GenerationConfig {
        resolution: format!("{SIZE}x{SIZE}"),
        ..Default::default()
    }
}

/// Red channel of the first pixel, which the fakes use as a frame tag.
pub fn tag(frame: &Frame) -> u8 {
    frame.as_rgb()[0]
}

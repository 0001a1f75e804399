//! Explicit handle to the inference resource.
//!
//! The engine is built once at startup and passed to the orchestrator. It
//! owns the capability implementations and a single inference lock so only
//! one caller at a time drives the model device.

use std::sync::Arc;

use motionweave_core::frame::{Frame, PoseFrame};
use tokio::sync::Mutex;

use crate::capabilities::{
    ExtractionError, FaceRestorer, FrameGenerator, GenerationError, GenerationRequest,
    PoseExtractor, RestorationError, VideoExporter, VideoSource,
};
use crate::error::PipelineError;

/// Capability implementations an [`Engine`] is assembled from.
pub struct EngineParts {
    pub source: Arc<dyn VideoSource>,
    pub pose: Arc<dyn PoseExtractor>,
    pub generator: Arc<dyn FrameGenerator>,
    /// `None` disables the enhancement pass entirely.
    pub restorer: Option<Arc<dyn FaceRestorer>>,
    pub exporter: Arc<dyn VideoExporter>,
}

pub struct Engine {
    parts: EngineParts,
    inference_lock: Mutex<()>,
}

impl Engine {
    pub fn new(parts: EngineParts) -> Self {
        Self {
            parts,
            inference_lock: Mutex::new(()),
        }
    }

    pub fn source(&self) -> &dyn VideoSource {
        self.parts.source.as_ref()
    }

    pub fn exporter(&self) -> &dyn VideoExporter {
        self.parts.exporter.as_ref()
    }

    pub fn has_restorer(&self) -> bool {
        self.parts.restorer.is_some()
    }

    /// Run pose estimation over every frame, holding the device for the
    /// whole sequence. Pose frames keep their source index.
    pub async fn extract_poses(&self, frames: &[Frame]) -> Result<Vec<PoseFrame>, ExtractionError> {
        let _device = self.inference_lock.lock().await;

        let mut poses = Vec::with_capacity(frames.len());
        for (index, frame) in frames.iter().enumerate() {
            let map = self.parts.pose.extract_pose(frame).await?;
            poses.push(PoseFrame { index, map });
        }
        Ok(poses)
    }

    /// One generation call under the inference lock.
    pub async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<Vec<Frame>, GenerationError> {
        let _device = self.inference_lock.lock().await;
        self.parts.generator.generate_frames(request).await
    }

    /// Restore every frame, preserving count and order.
    ///
    /// Returns the input unchanged when no restorer is configured.
    pub async fn restore_sequence(&self, frames: &[Frame]) -> Result<Vec<Frame>, RestorationError> {
        let Some(restorer) = &self.parts.restorer else {
            return Ok(frames.to_vec());
        };

        let _device = self.inference_lock.lock().await;
        let mut restored = Vec::with_capacity(frames.len());
        for frame in frames {
            restored.push(restorer.restore_face(frame).await?);
        }
        Ok(restored)
    }
}

/// The engine as seen by the orchestrator: ready, or failed to initialise.
///
/// An unavailable engine does not stop the server; every job that reaches
/// the worker fails before it starts processing.
#[derive(Clone)]
pub enum EngineHandle {
    Ready(Arc<Engine>),
    Unavailable(String),
}

impl EngineHandle {
    pub fn ready(engine: Engine) -> Self {
        Self::Ready(Arc::new(engine))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The init failure, when the engine is unavailable.
    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Self::Ready(_) => None,
            Self::Unavailable(reason) => Some(reason),
        }
    }

    /// The engine, or `EngineUnavailable` carrying the init failure.
    pub fn get(&self) -> Result<&Arc<Engine>, PipelineError> {
        match self {
            Self::Ready(engine) => Ok(engine),
            Self::Unavailable(reason) => Err(PipelineError::EngineUnavailable(reason.clone())),
        }
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("EngineHandle::Ready"),
            Self::Unavailable(reason) => write!(f, "EngineHandle::Unavailable({reason})"),
        }
    }
}

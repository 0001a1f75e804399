//! Narrow interfaces to the external model and media collaborators.
//!
//! The orchestrator never loads models or touches a device directly; it
//! talks to these traits. Implementations live in `motionweave-inference`
//! (HTTP model server + FFmpeg) and in test fakes.

use std::path::Path;

use async_trait::async_trait;
use motionweave_core::frame::{Frame, PoseFrame};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reading the inputs or running pose estimation failed.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ExtractionError(pub String);

/// The frame generation model failed.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct GenerationError(pub String);

/// Face restoration failed.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct RestorationError(pub String);

/// Encoding or writing the output video failed.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ExportError(pub String);

// ---------------------------------------------------------------------------
// Generation request
// ---------------------------------------------------------------------------

/// Model parameters that are fixed for the lifetime of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParams {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub noise_aug_strength: f64,
}

/// One call to the frame generation model.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub reference: &'a Frame,
    pub poses: &'a [PoseFrame],
    pub seed: u64,
    pub length: usize,
    pub params: &'a GenerationParams,
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Decodes the job's input files.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Load the reference still image.
    async fn load_image(&self, path: &Path) -> Result<Frame, ExtractionError>;

    /// Decode the driving video in order, stopping after `max_frames`.
    async fn decode_video(
        &self,
        path: &Path,
        max_frames: usize,
    ) -> Result<Vec<Frame>, ExtractionError>;
}

/// Frame image -> pose representation. Stateless per call.
#[async_trait]
pub trait PoseExtractor: Send + Sync {
    async fn extract_pose(&self, frame: &Frame) -> Result<Frame, ExtractionError>;
}

/// Reference image + pose window -> generated frames. Stateless per call.
///
/// Must return exactly `request.length` frames.
#[async_trait]
pub trait FrameGenerator: Send + Sync {
    async fn generate_frames(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<Vec<Frame>, GenerationError>;
}

/// Frame -> refined frame. Identity and order preserving.
#[async_trait]
pub trait FaceRestorer: Send + Sync {
    async fn restore_face(&self, frame: &Frame) -> Result<Frame, RestorationError>;
}

/// Writes the final frame sequence to a video file.
#[async_trait]
pub trait VideoExporter: Send + Sync {
    async fn export_video(&self, frames: &[Frame], path: &Path, fps: u32)
        -> Result<(), ExportError>;
}

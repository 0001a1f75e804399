//! Capability implementations backed by the model server and FFmpeg.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use motionweave_core::frame::Frame;
use motionweave_pipeline::capabilities::{
    ExportError, ExtractionError, FaceRestorer, FrameGenerator, GenerationError,
    GenerationRequest, PoseExtractor, RestorationError, VideoExporter, VideoSource,
};

use crate::api::{GenerateParams, InferenceApi};
use crate::codec::{decode_image, encode_png, split_rgb_frames};
use crate::ffmpeg;

// ---------------------------------------------------------------------------
// Model server
// ---------------------------------------------------------------------------

/// Pose, generation and restoration over HTTP.
pub struct ModelServer {
    api: Arc<InferenceApi>,
}

impl ModelServer {
    pub fn new(api: Arc<InferenceApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PoseExtractor for ModelServer {
    async fn extract_pose(&self, frame: &Frame) -> Result<Frame, ExtractionError> {
        let png = encode_png(frame).map_err(|e| ExtractionError(e.to_string()))?;
        let pose = self
            .api
            .pose(png)
            .await
            .map_err(|e| ExtractionError(e.to_string()))?;
        decode_image(&pose).map_err(|e| ExtractionError(e.to_string()))
    }
}

#[async_trait]
impl FrameGenerator for ModelServer {
    async fn generate_frames(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<Vec<Frame>, GenerationError> {
        let reference = encode_png(request.reference).map_err(|e| GenerationError(e.to_string()))?;
        let poses = request
            .poses
            .iter()
            .map(|p| encode_png(&p.map))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| GenerationError(e.to_string()))?;

        let params = GenerateParams {
            seed: request.seed,
            length: request.length,
            width: request.params.width,
            height: request.params.height,
            fps: request.params.fps,
            num_inference_steps: request.params.num_inference_steps,
            guidance_scale: request.params.guidance_scale,
            noise_aug_strength: request.params.noise_aug_strength,
        };

        let raw = self
            .api
            .generate(reference, poses, &params)
            .await
            .map_err(|e| GenerationError(e.to_string()))?;

        split_rgb_frames(&raw.data, raw.width, raw.height).map_err(|e| GenerationError(e.to_string()))
    }
}

#[async_trait]
impl FaceRestorer for ModelServer {
    async fn restore_face(&self, frame: &Frame) -> Result<Frame, RestorationError> {
        let png = encode_png(frame).map_err(|e| RestorationError(e.to_string()))?;
        let restored = self
            .api
            .restore(png)
            .await
            .map_err(|e| RestorationError(e.to_string()))?;
        let restored = decode_image(&restored).map_err(|e| RestorationError(e.to_string()))?;

        // Restoration must not change the frame size.
        Ok(restored.resized(frame.width(), frame.height()))
    }
}

// ---------------------------------------------------------------------------
// FFmpeg media
// ---------------------------------------------------------------------------

/// Reads job inputs and writes the output video with local binaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegMedia;

#[async_trait]
impl VideoSource for FfmpegMedia {
    async fn load_image(&self, path: &Path) -> Result<Frame, ExtractionError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ExtractionError(format!("cannot read {}: {e}", path.display())))?;
        decode_image(&bytes).map_err(|e| ExtractionError(e.to_string()))
    }

    async fn decode_video(&self, path: &Path, max_frames: usize) -> Result<Vec<Frame>, ExtractionError> {
        ffmpeg::decode_frames(path, max_frames)
            .await
            .map_err(|e| ExtractionError(e.to_string()))
    }
}

#[async_trait]
impl VideoExporter for FfmpegMedia {
    async fn export_video(&self, frames: &[Frame], path: &Path, fps: u32) -> Result<(), ExportError> {
        ffmpeg::encode_frames(frames, path, fps)
            .await
            .map_err(|e| ExportError(e.to_string()))
    }
}

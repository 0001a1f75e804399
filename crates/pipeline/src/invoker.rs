//! Generation invoker: runs one scheduled chunk through the frame generator.

use motionweave_core::chunking::Chunk;
use motionweave_core::frame::{Frame, PoseFrame};

use crate::capabilities::{GenerationError, GenerationParams, GenerationRequest};
use crate::engine::Engine;
use crate::error::PipelineError;

/// Per-job generation context. Holds no state between calls.
///
/// The seed is fixed for the whole job so every chunk is requested with
/// identical parameters for identical inputs.
pub struct GenerationInvoker<'a> {
    engine: &'a Engine,
    reference: &'a Frame,
    poses: &'a [PoseFrame],
    seed: u64,
    params: &'a GenerationParams,
}

impl<'a> GenerationInvoker<'a> {
    pub fn new(
        engine: &'a Engine,
        reference: &'a Frame,
        poses: &'a [PoseFrame],
        seed: u64,
        params: &'a GenerationParams,
    ) -> Self {
        Self {
            engine,
            reference,
            poses,
            seed,
            params,
        }
    }

    /// The exact request sent for `chunk`.
    pub fn request_for(&self, chunk: &Chunk) -> GenerationRequest<'a> {
        GenerationRequest {
            reference: self.reference,
            poses: &self.poses[chunk.range()],
            seed: self.seed,
            length: chunk.len(),
            params: self.params,
        }
    }

    /// Generate the frames for `chunk`. No retries.
    ///
    /// Output that does not match the requested length or frame size is
    /// treated as a generation failure of this chunk.
    pub async fn invoke(&self, chunk: &Chunk) -> Result<Vec<Frame>, PipelineError> {
        let fail = |cause: GenerationError| PipelineError::Generation {
            chunk_index: chunk.index,
            cause,
        };

        let frames = self
            .engine
            .generate(self.request_for(chunk))
            .await
            .map_err(fail)?;

        if frames.len() != chunk.len() {
            return Err(fail(GenerationError(format!(
                "expected {} frames, model returned {}",
                chunk.len(),
                frames.len()
            ))));
        }

        let expected = (self.params.width, self.params.height);
        if let Some(frame) = frames.iter().find(|f| f.dimensions() != expected) {
            let (w, h) = frame.dimensions();
            return Err(fail(GenerationError(format!(
                "expected {}x{} frames, model returned {w}x{h}",
                expected.0, expected.1
            ))));
        }

        Ok(frames)
    }
}

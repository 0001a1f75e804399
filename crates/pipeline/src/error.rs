use std::time::Duration;

use motionweave_core::error::CoreError;

use crate::capabilities::{ExportError, ExtractionError, GenerationError, RestorationError};

/// Every way a job can fail, from submission to export.
///
/// All variants except [`PipelineError::Restoration`] are fatal to the job.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid assets: {0}")]
    InvalidAsset(String),

    #[error("Inference engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Pose extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Generation failed on chunk {chunk_index}: {cause}")]
    Generation {
        chunk_index: usize,
        cause: GenerationError,
    },

    #[error("Face restoration failed: {0}")]
    Restoration(#[from] RestorationError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    #[error("Invalid chunk window: {0}")]
    InvalidWindow(String),

    #[error("Stage '{stage}' exceeded its {limit:?} deadline")]
    Timeout { stage: &'static str, limit: Duration },

    #[error("Job {0} not found")]
    NotFound(String),

    #[error("Job queue is closed")]
    QueueClosed,

    #[error(transparent)]
    Core(CoreError),
}

impl From<CoreError> for PipelineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidWindow(msg) => PipelineError::InvalidWindow(msg),
            CoreError::NotFound { id, .. } => PipelineError::NotFound(id),
            other => PipelineError::Core(other),
        }
    }
}

//! Job model: status state machine, stage labels, and generation config.
//!
//! A [`Job`] is created on submission and mutated only through the methods
//! below, which enforce the one-way lifecycle
//! `Queued -> Processing -> {Completed, Failed}` (plus `Queued -> Failed`
//! for jobs that never get to start) and keep progress non-decreasing.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::progress::{stage_entry_progress, PROGRESS_COMPLETED};
use crate::resolution::{parse_resolution, DEFAULT_RESOLUTION};
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self -> next` is an allowed transition.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Human-readable pipeline step the job is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStage {
    #[serde(rename = "Queued")]
    Queued,
    #[serde(rename = "Initializing")]
    Initializing,
    #[serde(rename = "Extracting Pose")]
    ExtractingPose,
    #[serde(rename = "Generating Animation")]
    GeneratingAnimation,
    #[serde(rename = "Enhancing")]
    Enhancing,
    #[serde(rename = "Finalizing")]
    Finalizing,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Failed")]
    Failed,
}

impl JobStage {
    pub fn label(self) -> &'static str {
        match self {
            JobStage::Queued => "Queued",
            JobStage::Initializing => "Initializing",
            JobStage::ExtractingPose => "Extracting Pose",
            JobStage::GeneratingAnimation => "Generating Animation",
            JobStage::Enhancing => "Enhancing",
            JobStage::Finalizing => "Finalizing",
            JobStage::Completed => "Completed",
            JobStage::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Generation config
// ---------------------------------------------------------------------------

/// Upper bound on requested clip duration in seconds.
pub const MAX_DURATION_SECS: u32 = 120;

/// Key-light settings. Opaque to the orchestrator; forwarded to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub key: String,
    pub intensity: f64,
    pub env: Option<String>,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            key: "left".to_string(),
            intensity: 0.8,
            env: Some("studio".to_string()),
        }
    }
}

/// User-supplied generation settings.
///
/// Only `duration` (frame budget), `resolution` (output size) and `seed`
/// influence scheduling; the rest is passed through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub duration: u32,
    pub resolution: String,
    pub camera_motion: String,
    pub lighting: LightingConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            duration: 5,
            resolution: DEFAULT_RESOLUTION.to_string(),
            camera_motion: "static".to_string(),
            lighting: LightingConfig::default(),
            seed: None,
        }
    }
}

impl GenerationConfig {
    /// Validate ranges and that the resolution label parses.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.duration == 0 || self.duration > MAX_DURATION_SECS {
            return Err(CoreError::Validation(format!(
                "duration must be between 1 and {MAX_DURATION_SECS} seconds (got {})",
                self.duration
            )));
        }
        if !(0.0..=1.0).contains(&self.lighting.intensity) {
            return Err(CoreError::Validation(format!(
                "lighting.intensity must be within [0, 1] (got {})",
                self.lighting.intensity
            )));
        }
        parse_resolution(&self.resolution)?;
        Ok(())
    }

    /// Output frame size in pixels.
    pub fn dimensions(&self) -> Result<(u32, u32), CoreError> {
        parse_resolution(&self.resolution)
    }
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Input files a job is generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobAssets {
    /// Still image of the character to animate.
    pub reference_image: PathBuf,
    /// Video whose motion drives the animation.
    pub driving_video: PathBuf,
    /// Optional soundtrack. Stored with the job but not used for generation.
    pub audio: Option<PathBuf>,
}

impl JobAssets {
    /// Required files that do not exist on disk.
    pub fn missing(&self) -> Vec<&PathBuf> {
        [&self.reference_image, &self.driving_video]
            .into_iter()
            .filter(|p| !p.is_file())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Snapshot of a generation job.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub stage: JobStage,
    pub progress: u8,
    pub config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(skip)]
    pub assets: JobAssets,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    /// A freshly submitted job: `Queued`, progress 0.
    pub fn new(id: JobId, config: GenerationConfig, assets: JobAssets) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            status: JobStatus::Queued,
            stage: JobStage::Queued,
            progress: 0,
            config,
            error: None,
            output_url: None,
            assets,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::Conflict(format!(
                "job {} cannot move from {} to {}",
                self.id,
                self.status.as_str(),
                next.as_str()
            )));
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = chrono::Utc::now();
    }

    /// `Queued -> Processing`, stage `Initializing`.
    pub fn start(&mut self) -> Result<(), CoreError> {
        self.transition(JobStatus::Processing)?;
        self.enter_stage(JobStage::Initializing)
    }

    /// Move to a new stage while processing, raising progress to the
    /// stage's entry value.
    pub fn enter_stage(&mut self, stage: JobStage) -> Result<(), CoreError> {
        if self.status != JobStatus::Processing {
            return Err(CoreError::Conflict(format!(
                "job {} is {}, cannot enter stage '{stage}'",
                self.id,
                self.status.as_str()
            )));
        }
        self.stage = stage;
        if let Some(p) = stage_entry_progress(stage) {
            self.advance_progress(p);
        }
        self.touch();
        Ok(())
    }

    /// Raise progress to `value`; lower values are ignored.
    pub fn advance_progress(&mut self, value: u8) -> bool {
        let value = value.min(PROGRESS_COMPLETED);
        if value > self.progress {
            self.progress = value;
            self.touch();
            true
        } else {
            false
        }
    }

    /// `Processing -> Completed` with the exported artifact's location.
    pub fn complete(&mut self, output_url: String) -> Result<(), CoreError> {
        self.transition(JobStatus::Completed)?;
        self.stage = JobStage::Completed;
        self.progress = PROGRESS_COMPLETED;
        self.output_url = Some(output_url);
        Ok(())
    }

    /// `{Queued, Processing} -> Failed` with a human-readable cause.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), CoreError> {
        self.transition(JobStatus::Failed)?;
        self.stage = JobStage::Failed;
        self.error = Some(error.into());
        self.output_url = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

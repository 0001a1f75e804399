use std::time::Duration;

use motionweave_core::chunking::{validate_window, DEFAULT_OVERLAP, DEFAULT_WINDOW};
use motionweave_core::error::CoreError;

use crate::capabilities::GenerationParams;

/// Default output frame rate (frames per second).
pub const DEFAULT_FPS: u32 = 25;
/// Seed used when the job config does not specify one.
pub const DEFAULT_SEED: u64 = 42;
/// Diffusion steps per generated window.
pub const DEFAULT_INFERENCE_STEPS: u32 = 25;
/// Classifier-free guidance scale.
pub const DEFAULT_GUIDANCE_SCALE: f64 = 2.0;
/// Noise augmentation applied to the reference image.
pub const DEFAULT_NOISE_AUG_STRENGTH: f64 = 0.0;

/// Deadline for each pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub extraction: Duration,
    pub generation: Duration,
    pub restoration: Duration,
    pub export: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            extraction: Duration::from_secs(600),
            generation: Duration::from_secs(3600),
            restoration: Duration::from_secs(900),
            export: Duration::from_secs(300),
        }
    }
}

/// Scheduling and model settings shared by every job.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Pose frames per inference window.
    pub window: usize,
    /// Frames shared between consecutive windows.
    pub overlap: usize,
    pub fps: u32,
    pub default_seed: u64,
    /// Run the face restoration pass when the engine provides one.
    pub face_restoration: bool,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub noise_aug_strength: f64,
    pub timeouts: StageTimeouts,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            overlap: DEFAULT_OVERLAP,
            fps: DEFAULT_FPS,
            default_seed: DEFAULT_SEED,
            face_restoration: true,
            num_inference_steps: DEFAULT_INFERENCE_STEPS,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            noise_aug_strength: DEFAULT_NOISE_AUG_STRENGTH,
            timeouts: StageTimeouts::default(),
        }
    }
}

impl PipelineSettings {
    /// Load settings from environment variables with defaults.
    ///
    /// | Env Var                    | Default |
    /// |----------------------------|---------|
    /// | `CHUNK_WINDOW`             | `16`    |
    /// | `CHUNK_OVERLAP`            | `4`     |
    /// | `OUTPUT_FPS`               | `25`    |
    /// | `DEFAULT_SEED`             | `42`    |
    /// | `ENABLE_FACE_RESTORATION`  | `true`  |
    /// | `EXTRACTION_TIMEOUT_SECS`  | `600`   |
    /// | `GENERATION_TIMEOUT_SECS`  | `3600`  |
    /// | `RESTORATION_TIMEOUT_SECS` | `900`   |
    /// | `EXPORT_TIMEOUT_SECS`      | `300`   |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeouts = StageTimeouts {
            extraction: env_secs("EXTRACTION_TIMEOUT_SECS", defaults.timeouts.extraction),
            generation: env_secs("GENERATION_TIMEOUT_SECS", defaults.timeouts.generation),
            restoration: env_secs("RESTORATION_TIMEOUT_SECS", defaults.timeouts.restoration),
            export: env_secs("EXPORT_TIMEOUT_SECS", defaults.timeouts.export),
        };

        Self {
            window: env_parse("CHUNK_WINDOW", defaults.window),
            overlap: env_parse("CHUNK_OVERLAP", defaults.overlap),
            fps: env_parse("OUTPUT_FPS", defaults.fps),
            default_seed: env_parse("DEFAULT_SEED", defaults.default_seed),
            face_restoration: env_parse("ENABLE_FACE_RESTORATION", defaults.face_restoration),
            timeouts,
            ..defaults
        }
    }

    /// Reject window/overlap combinations the scheduler cannot plan.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_window(self.window, self.overlap)?;
        if self.fps == 0 {
            return Err(CoreError::Validation("OUTPUT_FPS must be positive".into()));
        }
        Ok(())
    }

    /// Model parameters for a job rendered at `width` x `height`.
    pub fn generation_params(&self, width: u32, height: u32) -> GenerationParams {
        GenerationParams {
            width,
            height,
            fps: self.fps,
            num_inference_steps: self.num_inference_steps,
            guidance_scale: self.guidance_scale,
            noise_aug_strength: self.noise_aug_strength,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid value, got '{raw}'")),
        Err(_) => default,
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    Duration::from_secs(env_parse(key, default.as_secs()))
}

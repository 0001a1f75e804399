//! Job orchestrator.
//!
//! Owns every job state transition. `submit` validates and enqueues;
//! `run` (called by the queue worker) drives a job through
//! extraction, chunked generation, optional enhancement and export, and
//! always leaves it in a terminal state.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use motionweave_core::chunking::{frame_budget, plan_chunks, stitched_len};
use motionweave_core::error::CoreError;
use motionweave_core::frame::{Frame, PoseFrame};
use motionweave_core::job::{GenerationConfig, Job, JobAssets, JobStage, JobStatus};
use motionweave_core::progress::{generation_progress, PROGRESS_ENHANCED, PROGRESS_EXTRACTED};
use motionweave_core::stitching::stitch;
use motionweave_core::types::JobId;

use crate::capabilities::{ExtractionError, GenerationError, GenerationParams};
use crate::engine::{Engine, EngineHandle};
use crate::error::PipelineError;
use crate::invoker::GenerationInvoker;
use crate::queue::JobQueue;
use crate::settings::PipelineSettings;
use crate::store::JobStore;

// ---------------------------------------------------------------------------
// Output layout
// ---------------------------------------------------------------------------

/// Where exported videos are written and how they are addressed publicly.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub dir: PathBuf,
    /// Base URL the `/outputs` directory is served under, without a
    /// trailing slash.
    pub public_base_url: String,
}

impl OutputLayout {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        let base: String = public_base_url.into();
        Self {
            dir: dir.into(),
            public_base_url: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn file_name(id: JobId) -> String {
        format!("{id}.mp4")
    }

    pub fn video_path(&self, id: JobId) -> PathBuf {
        self.dir.join(Self::file_name(id))
    }

    pub fn video_url(&self, id: JobId) -> String {
        format!("{}/outputs/{}", self.public_base_url, Self::file_name(id))
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    store: Arc<JobStore>,
    engine: EngineHandle,
    queue: JobQueue,
    settings: PipelineSettings,
    output: OutputLayout,
}

impl Orchestrator {
    pub fn new(
        store: Arc<JobStore>,
        engine: EngineHandle,
        queue: JobQueue,
        settings: PipelineSettings,
        output: OutputLayout,
    ) -> Self {
        Self {
            store,
            engine,
            queue,
            settings,
            output,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Accept a job under a fresh id.
    pub async fn submit(
        &self,
        config: GenerationConfig,
        assets: JobAssets,
    ) -> Result<Job, PipelineError> {
        self.submit_as(JobId::new(), config, assets).await
    }

    /// Accept a job under a caller-chosen id (used when uploads are named
    /// after the job before it exists).
    ///
    /// Returns the `Queued` snapshot; execution happens on the queue worker.
    pub async fn submit_as(
        &self,
        id: JobId,
        config: GenerationConfig,
        assets: JobAssets,
    ) -> Result<Job, PipelineError> {
        config.validate()?;
        check_assets(&assets)?;

        let job = self.store.create(Job::new(id, config, assets)).await?;

        if let Err(e) = self.queue.enqueue(id) {
            tracing::error!(job_id = %id, "Job queue closed, failing job");
            self.store.update(id, |j| j.fail(e.to_string())).await?;
            return Err(e);
        }

        tracing::info!(
            job_id = %id,
            resolution = %job.config.resolution,
            duration = job.config.duration,
            "Job queued",
        );
        Ok(job)
    }

    /// Current snapshot of a job.
    pub async fn status(&self, id: JobId) -> Result<Job, PipelineError> {
        self.store.get(id).await.ok_or_else(|| {
            CoreError::NotFound {
                entity: "Job",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Execute a queued job to completion or failure.
    ///
    /// Never returns an error: every failure is recorded on the job.
    pub async fn run(&self, id: JobId) {
        let Some(job) = self.store.get(id).await else {
            tracing::warn!(job_id = %id, "Dequeued job no longer exists");
            return;
        };
        if job.status != JobStatus::Queued {
            tracing::warn!(job_id = %id, status = job.status.as_str(), "Skipping job that is not queued");
            return;
        }

        // Pre-start failures move the job straight from Queued to Failed.
        let engine = match self.preflight(&job) {
            Ok(engine) => engine,
            Err(e) => {
                self.record_failure(id, &e).await;
                return;
            }
        };

        if let Err(e) = self.store.update(id, |j| j.start()).await {
            tracing::error!(job_id = %id, error = %e, "Failed to start job");
            return;
        }
        tracing::info!(job_id = %id, "Job processing started");

        match self.execute(&engine, &job).await {
            Ok(output_url) => {
                match self
                    .store
                    .update(id, |j| j.complete(output_url.clone()))
                    .await
                {
                    Ok(_) => tracing::info!(job_id = %id, output_url = %output_url, "Job completed"),
                    Err(e) => tracing::error!(job_id = %id, error = %e, "Failed to complete job"),
                }
            }
            Err(e) => self.record_failure(id, &e).await,
        }
    }

    fn preflight(&self, job: &Job) -> Result<Arc<Engine>, PipelineError> {
        let engine = self.engine.get()?.clone();
        check_assets(&job.assets)?;
        Ok(engine)
    }

    async fn record_failure(&self, id: JobId, error: &PipelineError) {
        tracing::error!(job_id = %id, error = %error, "Job failed");
        if let Err(e) = self.store.update(id, |j| j.fail(error.to_string())).await {
            tracing::error!(job_id = %id, error = %e, "Failed to record job failure");
        }
    }

    /// Stage sequence. Any error short-circuits the remaining stages.
    async fn execute(&self, engine: &Engine, job: &Job) -> Result<String, PipelineError> {
        let id = job.id;
        let (width, height) = job.config.dimensions()?;
        let params = self.settings.generation_params(width, height);
        let seed = job.config.seed.unwrap_or(self.settings.default_seed);
        let timeouts = self.settings.timeouts;

        // -- extraction --
        self.enter_stage(id, JobStage::ExtractingPose).await?;
        let (reference, poses) = with_deadline(
            "extraction",
            timeouts.extraction,
            self.extract(engine, job, &params),
        )
        .await?;
        self.store
            .update(id, |j| {
                j.advance_progress(PROGRESS_EXTRACTED);
                Ok(())
            })
            .await?;
        tracing::info!(job_id = %id, pose_frames = poses.len(), "Pose extraction finished");

        // -- generation --
        self.enter_stage(id, JobStage::GeneratingAnimation).await?;
        let frames = with_deadline(
            "generation",
            timeouts.generation,
            self.generate(engine, id, &reference, &poses, seed, &params),
        )
        .await?;

        // -- enhancement --
        let frames = if self.settings.face_restoration && engine.has_restorer() {
            self.enter_stage(id, JobStage::Enhancing).await?;
            let frames = self.enhance(engine, id, frames, timeouts.restoration).await;
            self.store
                .update(id, |j| {
                    j.advance_progress(PROGRESS_ENHANCED);
                    Ok(())
                })
                .await?;
            frames
        } else {
            frames
        };

        // -- export --
        self.enter_stage(id, JobStage::Finalizing).await?;
        let path = self.output.video_path(id);
        with_deadline("export", timeouts.export, async {
            engine
                .exporter()
                .export_video(&frames, &path, self.settings.fps)
                .await
                .map_err(PipelineError::from)
        })
        .await?;
        tracing::info!(
            job_id = %id,
            frames = frames.len(),
            path = %path.display(),
            "Video exported",
        );

        Ok(self.output.video_url(id))
    }

    async fn enter_stage(&self, id: JobId, stage: JobStage) -> Result<(), PipelineError> {
        self.store.update(id, |j| j.enter_stage(stage)).await?;
        tracing::info!(job_id = %id, stage = %stage, "Stage started");
        Ok(())
    }

    /// Load the reference, decode the driving video up to the frame budget,
    /// and extract one pose map per frame.
    async fn extract(
        &self,
        engine: &Engine,
        job: &Job,
        params: &GenerationParams,
    ) -> Result<(Frame, Vec<PoseFrame>), PipelineError> {
        let reference = engine
            .source()
            .load_image(&job.assets.reference_image)
            .await?
            .resized(params.width, params.height);

        let budget = frame_budget(job.config.duration, self.settings.fps);
        let mut frames = engine
            .source()
            .decode_video(&job.assets.driving_video, budget)
            .await?;
        if frames.len() > budget {
            tracing::warn!(
                job_id = %job.id,
                decoded = frames.len(),
                budget,
                "Video source ignored the frame cap, truncating",
            );
            frames.truncate(budget);
        }
        if frames.is_empty() {
            return Err(ExtractionError("no frames extracted from driving video".into()).into());
        }

        let poses = engine.extract_poses(&frames).await?;
        Ok((reference, poses))
    }

    /// Generate every chunk in order and fold them into one sequence.
    async fn generate(
        &self,
        engine: &Engine,
        id: JobId,
        reference: &Frame,
        poses: &[PoseFrame],
        seed: u64,
        params: &GenerationParams,
    ) -> Result<Vec<Frame>, PipelineError> {
        let plan = plan_chunks(poses.len(), self.settings.window, self.settings.overlap)?;
        let total = plan.len();
        tracing::info!(job_id = %id, chunks = total, seed, "Generation planned");

        let invoker = GenerationInvoker::new(engine, reference, poses, seed, params);
        let mut stitched = Vec::with_capacity(stitched_len(&plan));

        for chunk in &plan {
            tracing::debug!(
                job_id = %id,
                chunk_index = chunk.index,
                start = chunk.start,
                end = chunk.end,
                "Generating chunk",
            );
            let frames = invoker.invoke(chunk).await?;

            stitched = stitch(stitched, frames, chunk.overlap).map_err(|e| {
                PipelineError::Generation {
                    chunk_index: chunk.index,
                    cause: GenerationError(e.to_string()),
                }
            })?;

            let progress = generation_progress(chunk.index + 1, total);
            self.store
                .update(id, |j| {
                    j.advance_progress(progress);
                    Ok(())
                })
                .await?;
        }

        Ok(stitched)
    }

    /// Restoration pass. Failure or timeout falls back to `frames`.
    async fn enhance(
        &self,
        engine: &Engine,
        id: JobId,
        frames: Vec<Frame>,
        deadline: Duration,
    ) -> Vec<Frame> {
        let result = with_deadline("restoration", deadline, async {
            engine
                .restore_sequence(&frames)
                .await
                .map_err(PipelineError::from)
        })
        .await;

        match result {
            Ok(restored) => restored,
            Err(e) => {
                tracing::warn!(
                    job_id = %id,
                    error = %e,
                    "Face restoration failed, using unrestored frames",
                );
                frames
            }
        }
    }
}

fn check_assets(assets: &JobAssets) -> Result<(), PipelineError> {
    let missing = assets.missing();
    if missing.is_empty() {
        return Ok(());
    }
    let names: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
    Err(PipelineError::InvalidAsset(format!(
        "missing required file(s): {}",
        names.join(", ")
    )))
}

async fn with_deadline<T, F>(stage: &'static str, deadline: Duration, fut: F) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, PipelineError>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| PipelineError::Timeout {
            stage,
            limit: deadline,
        })?
}

use std::path::PathBuf;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use motionweave_core::job::{GenerationConfig, Job, JobAssets};
use motionweave_core::types::JobId;
use motionweave_pipeline::error::PipelineError;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::uploads::{self, UploadKind};

/// How a `config_json` that is not valid JSON is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigParsing {
    /// Reject with 400.
    Strict,
    /// Log and fall back to the default config.
    Lenient,
}

/// POST /api/v1/jobs
///
/// Multipart form:
/// - `character_image` (required) still image of the character
/// - `reference_video` (required) driving video
/// - `audio` (optional) stored with the job, not used for generation
/// - `config_json` (optional) JSON [`GenerationConfig`]; absent fields default
///
/// Returns 201 with the queued job. Generation runs in the background.
pub async fn create_job(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Job>)> {
    let job = accept_job(&state, multipart, ConfigParsing::Strict).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// POST /api/v1/jobs/create
///
/// Older clients' path: same form as [`create_job`], but answers 200 and
/// treats a `config_json` that is not valid JSON as `{}`. Out-of-range
/// values are still rejected.
pub async fn create_job_legacy(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<Job>> {
    let job = accept_job(&state, multipart, ConfigParsing::Lenient).await?;
    Ok(Json(job))
}

/// Store the uploads under a fresh job id and submit the job.
///
/// Uploads are removed again if the job is not accepted.
async fn accept_job(
    state: &AppState,
    mut multipart: Multipart,
    parsing: ConfigParsing,
) -> AppResult<Job> {
    let id = JobId::new();
    let upload_dir = &state.config.upload_dir;

    let mut reference_image: Option<PathBuf> = None;
    let mut driving_video: Option<PathBuf> = None;
    let mut audio: Option<PathBuf> = None;
    let mut config_json: Option<String> = None;
    let mut saved: Vec<PathBuf> = Vec::new();

    let parsed: AppResult<()> = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or("").to_string();

            if name == "config_json" {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                config_json = Some(text);
                continue;
            }

            let Some(kind) = UploadKind::from_field(&name) else {
                continue; // ignore unknown fields
            };

            let path = uploads::upload_path(upload_dir, id, kind, field.file_name());
            saved.push(path.clone());
            let size = uploads::save_field(field, &path).await?;
            tracing::debug!(job_id = %id, field = %name, size, "Upload stored");

            // An empty part is the same as no file at all.
            if size == 0 {
                continue;
            }
            match kind {
                UploadKind::CharacterImage => reference_image = Some(path),
                UploadKind::ReferenceVideo => driving_video = Some(path),
                UploadKind::Audio => audio = Some(path),
            }
        }
        Ok(())
    }
    .await;

    let config = parsed.and_then(|()| parse_config(id, config_json.as_deref(), parsing));
    let submitted = match config {
        Ok(config) => submit(state, id, reference_image, driving_video, audio, config).await,
        Err(e) => Err(e),
    };

    match submitted {
        Ok(job) => Ok(job),
        Err(e) => {
            uploads::discard(&saved).await;
            Err(e)
        }
    }
}

async fn submit(
    state: &AppState,
    id: JobId,
    reference_image: Option<PathBuf>,
    driving_video: Option<PathBuf>,
    audio: Option<PathBuf>,
    config: GenerationConfig,
) -> AppResult<Job> {
    let reference_image = reference_image.ok_or_else(|| missing(UploadKind::CharacterImage))?;
    let driving_video = driving_video.ok_or_else(|| missing(UploadKind::ReferenceVideo))?;

    let assets = JobAssets {
        reference_image,
        driving_video,
        audio,
    };

    let job = state.orchestrator.submit_as(id, config, assets).await?;
    Ok(job)
}

fn parse_config(
    id: JobId,
    config_json: Option<&str>,
    parsing: ConfigParsing,
) -> AppResult<GenerationConfig> {
    let raw = match config_json.map(str::trim) {
        None | Some("") => return Ok(GenerationConfig::default()),
        Some(raw) => raw,
    };
    match serde_json::from_str(raw) {
        Ok(config) => Ok(config),
        Err(e) if parsing == ConfigParsing::Lenient => {
            tracing::warn!(job_id = %id, error = %e, "Ignoring malformed config_json");
            Ok(GenerationConfig::default())
        }
        Err(e) => Err(AppError::BadRequest(format!("Invalid config_json: {e}"))),
    }
}

fn missing(kind: UploadKind) -> AppError {
    AppError::Pipeline(PipelineError::InvalidAsset(format!(
        "'{}' file is required",
        kind.field_name()
    )))
}

/// GET /api/v1/jobs/{id}
///
/// Unknown or malformed ids answer 404 `{"status": "not_found"}`.
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Job>> {
    let id: JobId = id
        .parse()
        .map_err(|_| AppError::Pipeline(PipelineError::NotFound(id.clone())))?;
    let job = state.orchestrator.status(id).await?;
    Ok(Json(job))
}

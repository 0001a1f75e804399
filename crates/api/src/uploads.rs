//! Storage of multipart job inputs.
//!
//! Files are streamed to `<UPLOAD_DIR>/<job_id>_<suffix>.<ext>` so a job's
//! inputs can be located from its id alone.

use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use motionweave_core::types::JobId;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, AppResult};

/// The file parts accepted by job creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    CharacterImage,
    ReferenceVideo,
    Audio,
}

impl UploadKind {
    /// Match a multipart field name.
    pub fn from_field(name: &str) -> Option<Self> {
        match name {
            "character_image" => Some(Self::CharacterImage),
            "reference_video" => Some(Self::ReferenceVideo),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }

    pub fn field_name(self) -> &'static str {
        match self {
            Self::CharacterImage => "character_image",
            Self::ReferenceVideo => "reference_video",
            Self::Audio => "audio",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::CharacterImage => "char",
            Self::ReferenceVideo => "ref",
            Self::Audio => "audio",
        }
    }

    fn default_extension(self) -> &'static str {
        match self {
            Self::CharacterImage => "png",
            Self::ReferenceVideo => "mp4",
            Self::Audio => "wav",
        }
    }
}

/// Lowercased extension of an uploaded file name, or the kind's default
/// when it is missing or not plain alphanumeric.
pub fn extension(file_name: Option<&str>, kind: UploadKind) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| kind.default_extension().to_string())
}

/// Destination for one input of job `id`.
pub fn upload_path(dir: &Path, id: JobId, kind: UploadKind, file_name: Option<&str>) -> PathBuf {
    dir.join(format!("{id}_{}.{}", kind.suffix(), extension(file_name, kind)))
}

/// Stream a multipart field to `path`. Returns the number of bytes written.
pub async fn save_field(mut field: Field<'_>, path: &Path) -> AppResult<u64> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;
    }

    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    let mut written = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(written)
}

/// Best-effort removal of inputs from a rejected submission.
pub async fn discard(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove rejected upload");
        }
    }
}

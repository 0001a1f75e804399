use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use motionweave_core::error::CoreError;
use motionweave_pipeline::error::PipelineError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`PipelineError`] and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `motionweave_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A job submission or lookup error from the orchestrator.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Pipeline(err) => match err {
                // Unknown jobs keep the bare status body clients poll for.
                PipelineError::NotFound(_) => {
                    return (
                        StatusCode::NOT_FOUND,
                        axum::Json(json!({ "status": "not_found" })),
                    )
                        .into_response();
                }
                PipelineError::InvalidAsset(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_ASSET", msg.clone())
                }
                PipelineError::EngineUnavailable(msg) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "ENGINE_UNAVAILABLE",
                    msg.clone(),
                ),
                PipelineError::QueueClosed => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "QUEUE_CLOSED",
                    "The server is shutting down".to_string(),
                ),
                PipelineError::Core(core) => classify_core_error(core),
                other => {
                    tracing::error!(error = %other, "Pipeline error");
                    internal()
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::InvalidWindow(msg) | CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

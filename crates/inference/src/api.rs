//! REST client for the model server.
//!
//! The server hosts the pose estimator, the frame generation model and the
//! face restorer behind plain HTTP endpoints:
//!
//! | Endpoint         | Request                                   | Response                      |
//! |------------------|-------------------------------------------|-------------------------------|
//! | `GET /health`    |                                           | `{"status": "ok", ...}`       |
//! | `POST /pose`     | PNG body                                  | PNG pose map                  |
//! | `POST /restore`  | PNG body                                  | PNG                           |
//! | `POST /generate` | multipart `reference`, `pose_NNN`, `params` | raw RGB24 frames + size headers |

use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use crate::codec::pose_part_name;

/// Response header carrying the width of each returned raw frame.
pub const FRAME_WIDTH_HEADER: &str = "x-frame-width";
/// Response header carrying the height of each returned raw frame.
pub const FRAME_HEIGHT_HEADER: &str = "x-frame-height";

const PNG_MIME: &str = "image/png";

/// HTTP client for a single model server.
pub struct InferenceApi {
    client: reqwest::Client,
    api_url: String,
}

/// Body of `GET /health`.
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub device: Option<String>,
}

/// JSON `params` part of a `/generate` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateParams {
    pub seed: u64,
    pub length: usize,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub noise_aug_strength: f64,
}

/// Raw frames returned by `/generate`.
#[derive(Debug)]
pub struct RawFrames {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Errors from the model server API layer.
#[derive(Debug, thiserror::Error)]
pub enum InferenceApiError {
    /// The HTTP request itself failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("Model server error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The server answered 2xx but the response was not usable.
    #[error("Unexpected model server response: {0}")]
    Protocol(String),
}

impl InferenceApi {
    /// Create a client for the server at `api_url` (e.g. `http://host:8188`).
    ///
    /// `timeout` bounds every individual request.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, InferenceApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url))
    }

    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Check the server is up and its models are loaded.
    pub async fn health(&self) -> Result<HealthResponse, InferenceApiError> {
        let response = self
            .client
            .get(format!("{}/health", self.api_url))
            .send()
            .await?;

        let health: HealthResponse = Self::ensure_success(response).await?.json().await?;
        if health.status != "ok" {
            return Err(InferenceApiError::Protocol(format!(
                "server reports status '{}'",
                health.status
            )));
        }
        Ok(health)
    }

    /// Estimate the pose of one PNG-encoded frame.
    pub async fn pose(&self, png: Vec<u8>) -> Result<Vec<u8>, InferenceApiError> {
        self.post_png("pose", png).await
    }

    /// Restore faces in one PNG-encoded frame.
    pub async fn restore(&self, png: Vec<u8>) -> Result<Vec<u8>, InferenceApiError> {
        self.post_png("restore", png).await
    }

    /// Generate `params.length` frames from a reference image and a window
    /// of pose maps.
    pub async fn generate(
        &self,
        reference_png: Vec<u8>,
        pose_pngs: Vec<Vec<u8>>,
        params: &GenerateParams,
    ) -> Result<RawFrames, InferenceApiError> {
        let mut form = Form::new().part("reference", png_part(reference_png, "reference.png")?);
        for (position, png) in pose_pngs.into_iter().enumerate() {
            let name = pose_part_name(position);
            let file_name = format!("{name}.png");
            form = form.part(name, png_part(png, &file_name)?);
        }
        let params_json = serde_json::to_string(params)
            .map_err(|e| InferenceApiError::Protocol(format!("params encode failed: {e}")))?;
        form = form.text("params", params_json);

        let response = self
            .client
            .post(format!("{}/generate", self.api_url))
            .multipart(form)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        let width = frame_dimension(response.headers(), FRAME_WIDTH_HEADER)?;
        let height = frame_dimension(response.headers(), FRAME_HEIGHT_HEADER)?;
        let data = response.bytes().await?.to_vec();

        Ok(RawFrames {
            width,
            height,
            data,
        })
    }

    // ---- private helpers ----

    async fn post_png(&self, endpoint: &str, png: Vec<u8>) -> Result<Vec<u8>, InferenceApiError> {
        let response = self
            .client
            .post(format!("{}/{endpoint}", self.api_url))
            .header(CONTENT_TYPE, PNG_MIME)
            .body(png)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Return the response unchanged on success, or an
    /// [`InferenceApiError::Api`] with the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, InferenceApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(InferenceApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

fn png_part(png: Vec<u8>, file_name: &str) -> Result<Part, InferenceApiError> {
    Ok(Part::bytes(png)
        .file_name(file_name.to_string())
        .mime_str(PNG_MIME)?)
}

/// Parse a positive integer frame-size header.
pub fn frame_dimension(headers: &HeaderMap, name: &str) -> Result<u32, InferenceApiError> {
    let raw = headers
        .get(name)
        .ok_or_else(|| InferenceApiError::Protocol(format!("missing {name} header")))?;
    raw.to_str()
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
        .ok_or_else(|| InferenceApiError::Protocol(format!("invalid {name} header: {raw:?}")))
}

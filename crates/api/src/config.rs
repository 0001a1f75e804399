use std::path::PathBuf;
use std::time::Duration;

use motionweave_inference::InferenceConfig;

/// Default cap on a multipart upload body (512 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    /// A single `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `60`).
    pub request_timeout_secs: u64,
    /// How long to wait for the running job after shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Where uploaded inputs are stored.
    pub upload_dir: PathBuf,
    /// Where exported videos are written; served under `/outputs`.
    pub output_dir: PathBuf,
    /// Externally visible base URL used to build `output_url`.
    pub public_base_url: String,
    pub max_upload_bytes: usize,
    /// Model server base URL.
    pub inference_url: String,
    pub inference_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `HOST`                   | `0.0.0.0`               |
    /// | `PORT`                   | `8000`                  |
    /// | `CORS_ORIGINS`           | `*`                     |
    /// | `REQUEST_TIMEOUT_SECS`   | `60`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`                    |
    /// | `UPLOAD_DIR`             | `uploads`               |
    /// | `OUTPUT_DIR`             | `outputs`               |
    /// | `PUBLIC_BASE_URL`        | `http://localhost:8000` |
    /// | `MAX_UPLOAD_BYTES`       | `536870912`             |
    /// | `INFERENCE_URL`          | `http://localhost:8188` |
    /// | `INFERENCE_TIMEOUT_SECS` | `600`                   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let upload_dir: PathBuf = std::env::var("UPLOAD_DIR")
            .unwrap_or_else(|_| "uploads".into())
            .into();
        let output_dir: PathBuf = std::env::var("OUTPUT_DIR")
            .unwrap_or_else(|_| "outputs".into())
            .into();

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8000".into())
            .trim_end_matches('/')
            .to_string();

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .map(|v| v.parse().expect("MAX_UPLOAD_BYTES must be a valid usize"))
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let inference_url =
            std::env::var("INFERENCE_URL").unwrap_or_else(|_| "http://localhost:8188".into());

        let inference_timeout_secs: u64 = std::env::var("INFERENCE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("INFERENCE_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            upload_dir,
            output_dir,
            public_base_url,
            max_upload_bytes,
            inference_url,
            inference_timeout_secs,
        }
    }

    /// Whether CORS should accept any origin.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }

    pub fn inference_config(&self, face_restoration: bool) -> InferenceConfig {
        InferenceConfig {
            api_url: self.inference_url.clone(),
            request_timeout: Duration::from_secs(self.inference_timeout_secs),
            face_restoration,
        }
    }
}

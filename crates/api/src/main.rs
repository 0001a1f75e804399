use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use motionweave_pipeline::events::EventBus;
use motionweave_pipeline::orchestrator::{Orchestrator, OutputLayout};
use motionweave_pipeline::queue::{JobQueue, QueueWorker};
use motionweave_pipeline::settings::PipelineSettings;
use motionweave_pipeline::store::JobStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use motionweave_api::app::build_app;
use motionweave_api::config::ServerConfig;
use motionweave_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "motionweave_api=debug,motionweave_pipeline=debug,motionweave_inference=debug,tower_http=debug"
            .into()
    });
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let settings = PipelineSettings::from_env();
    settings
        .validate()
        .expect("Invalid pipeline settings (check CHUNK_WINDOW / CHUNK_OVERLAP / OUTPUT_FPS)");
    tracing::info!(
        window = settings.window,
        overlap = settings.overlap,
        fps = settings.fps,
        face_restoration = settings.face_restoration,
        "Loaded pipeline settings",
    );

    // --- Storage directories ---
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .expect("Failed to create upload directory");
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .expect("Failed to create output directory");

    // --- Inference engine ---
    let engine = motionweave_inference::connect(
        &config.inference_config(settings.face_restoration),
    )
    .await;
    if !engine.is_ready() {
        tracing::warn!("Starting without a ready engine; jobs will fail until restart");
    }

    // --- Event bus, store and queue ---
    let event_bus = Arc::new(EventBus::default());
    let store = Arc::new(JobStore::new(Arc::clone(&event_bus)));
    let (queue, receiver) = JobQueue::channel();

    let orchestrator = Arc::new(Orchestrator::new(
        store,
        engine,
        queue,
        settings,
        OutputLayout::new(config.output_dir.clone(), config.public_base_url.clone()),
    ));

    // Spawn the queue worker (one job at a time).
    let worker_cancel = CancellationToken::new();
    let worker_handle =
        QueueWorker::new(Arc::clone(&orchestrator), receiver).spawn(worker_cancel.clone());
    tracing::info!("Queue worker started");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator,
        event_bus,
    };

    let app = build_app(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    worker_cancel.cancel();
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(grace, worker_handle).await.is_err() {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Queue worker did not stop in time, abandoning running job",
        );
    } else {
        tracing::info!("Queue worker stopped");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

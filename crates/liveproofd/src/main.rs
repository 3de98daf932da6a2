use anyhow::{Context, Result};
use liveproof_core::MeshLandmarkProvider;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod engine;
mod stream;
mod upload;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("liveproofd starting");

    let config = config::Config::from_env()?;

    liveproof_models::verify_models_dir(&config.model_dir).context(
        "model verification failed; see `liveproof models` for the expected files",
    )?;

    let detector_path = config.detector_model_path();
    let mesh_path = config.mesh_model_path();
    let provider = MeshLandmarkProvider::load(&detector_path, &mesh_path)?;
    tracing::info!(detector = %detector_path, mesh = %mesh_path, "landmark models loaded");

    let engine = engine::spawn_engine(provider, config.engine_queue)?;

    let addr = config.bind_addr;
    tracing::info!(
        timeout_secs = config.session_timeout_secs,
        frame_stride = config.frame_stride,
        calibration_frames = config.liveness.calibration_frames,
        "liveness settings"
    );
    let app = api::router(api::AppState::new(engine, config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "liveproofd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("liveproofd shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

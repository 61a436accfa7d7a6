//! local-tts-server entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use local_tts::cli::ServerArgs;
use local_tts::config::ServerConfig;
use local_tts::logging;
use local_tts::runtime::{ModelRuntime, OnnxLoader};
use local_tts::service::{GenerationService, routes};
use local_tts::voice::VoiceRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    logging::init("info");

    let config = ServerConfig::from_args(&args);
    config
        .ensure_dirs()
        .context("Failed to create data directories")?;

    tracing::info!(
        model_dir = %config.model_dir.display(),
        voices_dir = %config.voices_dir.display(),
        output_dir = %config.output_dir.display(),
        "Starting local TTS server"
    );

    let runtime = Arc::new(ModelRuntime::new());
    let loader = OnnxLoader::new(config.model_dir.clone());
    let device = {
        let runtime = runtime.clone();
        let requested = config.device;
        tokio::task::spawn_blocking(move || runtime.load(&loader, requested))
            .await
            .context("Model loading task failed")?
            .with_context(|| format!("Failed to load model from {}", config.model_dir.display()))?
    };

    let service = Arc::new(GenerationService::new(
        runtime,
        VoiceRegistry::new(config.voices_dir.clone()),
        config.output_dir.clone(),
    ));

    let (addr, server) = warp::serve(routes(service))
        .try_bind_with_graceful_shutdown(config.addr, async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .with_context(|| format!("Failed to bind {}", config.addr))?;

    tracing::info!(%addr, %device, "Listening");
    server.await;
    Ok(())
}

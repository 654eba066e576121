mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use av1batch_core::{
    config_path_from_env, load_config, validate_config, CommandBuilder, ConversionPipeline,
    EncoderRunner, FfmpegRunner,
};

use api::create_router;
use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long shutdown waits for a cancelled conversion to wind down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("av1batch {}", VERSION);

    let config_path = config_path_from_env();

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Encoder path: {:?}", config.encoder.path);
    info!(
        "Default options: resolution={}, audio={}, quality={}",
        config.defaults.resolution,
        config.defaults.audio.codec(),
        config.defaults.quality
    );

    let runner = FfmpegRunner::new();
    if let Err(e) = runner.validate(&config.encoder.path).await {
        // Not fatal: the encoder may be installed later, and every batch
        // start re-checks it.
        warn!("Encoder is not usable yet: {}", e);
    }

    let pipeline = ConversionPipeline::new(
        runner,
        CommandBuilder::new(config.encoder.path.clone()),
        config.pipeline.event_buffer,
    );

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, pipeline.clone()));

    let app = create_router(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    stop_pipeline(&pipeline).await;

    Ok(())
}

/// Stops any running batch and waits briefly for the encoder to exit.
async fn stop_pipeline<R: EncoderRunner + 'static>(pipeline: &ConversionPipeline<R>) {
    if !pipeline.stop().await {
        return;
    }
    info!("Stopping running batch...");

    let wait = async {
        while pipeline.is_running() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, wait).await.is_err() {
        warn!("Batch did not stop within {:?}", SHUTDOWN_GRACE);
    } else {
        info!("Batch stopped");
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#![doc = include_str!("../README.md")]

mod app;

use app::config::CliArgs;
use app::observer::TelemetryObserver;
use app::telemetry::init_telemetry;
use clap::Parser;
use fanline::{Pipeline, PipelineConfig, ShutdownHandle};
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = PipelineConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let pipeline = Pipeline::new(config).with_observer(TelemetryObserver::default());
    log_startup_info(pipeline.config());
    let signals = tokio::spawn(shutdown_signal(pipeline.shutdown_handle()));

    let result = pipeline.run().await;
    signals.abort();

    match &result {
        Ok(summary) => tracing::info!(
            "done. processed={} errored={} submitted={}{}",
            summary.processed,
            summary.errored,
            summary.submitted,
            if summary.cancelled { " (cancelled)" } else { "" }
        ),
        Err(e) => tracing::error!("Pipeline failed: {e}"),
    }

    providers.shutdown();
    result?;
    Ok(())
}

fn log_startup_info(config: &PipelineConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting pipeline with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting pipeline with {} workers and capacity {}",
            config.workers(),
            config.admission_capacity()
        );
    }
}

/// Cancels the pipeline on Ctrl+C or SIGTERM. A second signal is harmless
/// since cancellation is idempotent.
async fn shutdown_signal(handle: ShutdownHandle) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, cancelling pipeline...");
    handle.cancel();
}

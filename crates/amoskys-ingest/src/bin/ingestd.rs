//! amoskys-ingestd - reference telemetry ingestor process.
//!
//! Polls the bus WAL (and, for diagnostics, any configured agent LDQ
//! directories) and drives the Fusion Engine, exposing a health/metrics
//! surface alongside it.

use amoskys_ingest::{Config, Ingestor};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("amoskys_ingest=info".parse().unwrap()))
        .init();

    let config = Config::parse();
    if let Err(e) = config.validate() {
        error!("invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = amoskys_ingest::metrics::install() {
        error!("failed to install metrics: {e}");
        return ExitCode::FAILURE;
    }

    info!("amoskys-ingestd v{} starting", env!("CARGO_PKG_VERSION"));

    let ingestor = match Ingestor::open(&config) {
        Ok(i) => Arc::new(i),
        Err(e) => {
            error!("failed to open ingestor: {e}");
            return ExitCode::FAILURE;
        }
    };

    let health_addr = config.health_addr;
    let health_ingestor = ingestor.clone();
    tokio::spawn(async move {
        amoskys_ingest::health_http::run_server(health_addr, health_ingestor).await;
    });

    match ingestor.run_forever().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("ingestor exited with error: {e}");
            ExitCode::FAILURE
        }
    }
}

//! amoskys-agentd - reference hardened agent process.
//!
//! Runs the heartbeat probe through the shared runtime against a configured
//! bus address, exposing a health/metrics surface alongside it.

use amoskys_agent::{AgentRuntime, Config, HeartbeatAgent, QuicPublisher};
use amoskys_ldq::Queue;
use amoskys_net::CertPaths;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("amoskys_agent=info".parse().unwrap()))
        .init();

    let config = Config::parse();
    if let Err(e) = config.validate() {
        error!("invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = amoskys_agent::metrics::install() {
        error!("failed to install metrics: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        "amoskys-agentd v{} starting agent {}",
        env!("CARGO_PKG_VERSION"),
        config.agent_name
    );

    let queue = match Queue::open(&config.ldq_dir) {
        Ok(q) => q,
        Err(e) => {
            error!("failed to open local durable queue at {:?}: {e}", config.ldq_dir);
            return ExitCode::FAILURE;
        }
    };

    let cert_paths = CertPaths::in_dir(&config.cert_dir, "agent");
    let publisher = match QuicPublisher::new(&cert_paths, config.bus_addr, "bus") {
        Ok(p) => p,
        Err(e) => {
            error!("failed to build QUIC publisher: {e}");
            return ExitCode::FAILURE;
        }
    };

    let agent = HeartbeatAgent::new(config.device_id.clone());
    let runtime = Arc::new(AgentRuntime::new(
        config.agent_name.clone(),
        config.device_id.clone(),
        Duration::from_secs(config.collection_interval_secs),
        agent,
        Box::new(publisher),
        queue,
    ));

    let health_addr = config.health_addr;
    let health_runtime = runtime.clone();
    tokio::spawn(async move {
        amoskys_agent::health_http::run_server(health_addr, health_runtime).await;
    });

    match runtime.run_forever().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("agent exited with error: {e}");
            ExitCode::FAILURE
        }
    }
}

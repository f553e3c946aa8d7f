//! busd - reference AMOSKYS Event Bus process.
//!
//! Accepts mTLS QUIC connections on `listen`, runs every `Publish` call
//! through the gate chain, and persists admitted envelopes to a
//! write-ahead log rooted at `data_dir`.

use amoskys_bus::{gates::BusState, health_http, metrics, server, Config};
use amoskys_ldq::Queue;
use amoskys_net::{transport, CertPaths, TrustMap};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Parse the trust map file: one `common_name public_key_pem_path` pair
/// per line, blank lines and `#`-prefixed lines ignored.
fn load_trust_map_entries(path: &Path) -> anyhow::Result<Vec<(String, std::path::PathBuf)>> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let cn = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("malformed trust map line: {line}"))?;
        let key_path = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("malformed trust map line: {line}"))?;
        entries.push((cn.to_string(), std::path::PathBuf::from(key_path)));
    }
    Ok(entries)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("amoskys_bus=info".parse().unwrap()))
        .init();

    let config = Config::parse();
    if let Err(e) = config.validate() {
        error!("invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = metrics::install() {
        error!("failed to register prometheus collectors: {e}");
        return ExitCode::FAILURE;
    }

    info!("busd v{} starting on {}", env!("CARGO_PKG_VERSION"), config.listen);

    let trust_entries = match load_trust_map_entries(&config.trust_map) {
        Ok(e) => e,
        Err(e) => {
            error!("failed to read trust map {:?}: {e}", config.trust_map);
            return ExitCode::FAILURE;
        }
    };
    let trust_map = match TrustMap::load(&trust_entries) {
        Ok(t) => t,
        Err(e) => {
            error!("failed to load trust map keys: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(peers = trust_map.len(), "trust map loaded");

    let wal = match Queue::open(&config.data_dir) {
        Ok(q) => q,
        Err(e) => {
            error!("failed to open write-ahead log at {:?}: {e}", config.data_dir);
            return ExitCode::FAILURE;
        }
    };

    transport::install_default_crypto_provider();
    let cert_paths = CertPaths::in_dir(&config.cert_dir, "bus");
    let endpoint = match transport::build_server_endpoint(config.listen, &cert_paths) {
        Ok(e) => e,
        Err(e) => {
            error!("failed to build QUIC server endpoint: {e}");
            return ExitCode::FAILURE;
        }
    };

    let state = Arc::new(BusState {
        trust_map,
        admission: amoskys_bus::AdmissionControl::new(config.max_inflight, config.hard_max),
        dedup: amoskys_bus::DedupMap::new(
            std::time::Duration::from_secs(config.dedupe_ttl_sec),
            config.dedupe_max,
        ),
        wal,
        max_env_bytes: config.max_env_bytes,
        overload_mode: config.overload_mode,
        retry_backoff_hint_ms: config.retry_backoff_hint_ms,
        overload_flag: AtomicBool::new(false),
    });

    let health_addr = config.health_addr;
    let health_state = state.clone();
    tokio::spawn(async move {
        health_http::run_server(health_addr, health_state).await;
    });

    server::run(endpoint, state).await;
    ExitCode::SUCCESS
}

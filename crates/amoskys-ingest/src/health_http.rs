//! Health/readiness/metrics HTTP surface for the ingestor process, same
//! route set and `tower` middleware stack as the agent's and bus's
//! equivalents, borrowed from `ioi-telemetry::http`.

use crate::ingestor::Ingestor;
use axum::{extract::State, response::Json, routing::get, Router};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

async fn healthz() -> &'static str {
    "OK"
}

async fn readyz() -> &'static str {
    "OK"
}

async fn health(State(ingestor): State<Arc<Ingestor>>) -> Json<crate::ingestor::HealthSummary> {
    Json(ingestor.health_summary())
}

async fn metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buf = Vec::with_capacity(4096);
    if let Err(e) = encoder.encode(&families, &mut buf) {
        tracing::error!(error = %e, "failed to encode prometheus metrics");
    }
    buf
}

/// Serve `/healthz`, `/readyz`, `/health` and `/metrics` until ctrl-c.
pub async fn run_server(addr: SocketAddr, ingestor: Arc<Ingestor>) {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).timeout(Duration::from_secs(2)))
        .with_state(ingestor);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind ingestor health http server");
            return;
        }
    };
    tracing::info!(%addr, "ingestor health endpoint listening");

    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        tracing::error!(error = %e, "ingestor health server error");
    }
}

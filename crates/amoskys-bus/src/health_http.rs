//! Liveness/readiness/metrics HTTP surface, distinct from the QUIC RPC
//! port (§4.6), same `axum` + `tower-http` shape as `ioi-telemetry::http`.

use crate::gates::BusState;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

async fn healthz() -> &'static str {
    "OK"
}

async fn readyz(State(state): State<Arc<BusState>>) -> (StatusCode, &'static str) {
    if state.is_overloaded() {
        (StatusCode::SERVICE_UNAVAILABLE, "OVERLOADED")
    } else {
        (StatusCode::OK, "OK")
    }
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

pub async fn run_server(addr: SocketAddr, state: Arc<BusState>) {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).timeout(Duration::from_secs(2)))
        .with_state(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind bus health http server");
            return;
        }
    };
    tracing::info!(%addr, "bus health endpoint listening");

    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        tracing::error!(error = %e, "bus health server error");
    }
}

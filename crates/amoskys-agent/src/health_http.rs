//! Health/readiness/metrics HTTP surface for an agent process (§4.5 ambient
//! addition). Same route set and `tower` middleware stack as the bus's
//! equivalent surface, borrowed from `ioi-telemetry::http`.

use crate::runtime::{AgentRuntime, HardenedAgent};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

async fn healthz() -> &'static str {
    "OK"
}

async fn readyz<A: HardenedAgent + 'static>(
    State(runtime): State<Arc<AgentRuntime<A>>>,
) -> (StatusCode, &'static str) {
    if runtime.health_summary().circuit_breaker_state == "OPEN" {
        (StatusCode::SERVICE_UNAVAILABLE, "circuit open")
    } else {
        (StatusCode::OK, "OK")
    }
}

async fn health<A: HardenedAgent + 'static>(
    State(runtime): State<Arc<AgentRuntime<A>>>,
) -> Json<crate::runtime::HealthSummary> {
    Json(runtime.health_summary())
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
pub async fn run_server<A: HardenedAgent + 'static>(addr: SocketAddr, runtime: Arc<AgentRuntime<A>>) {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz::<A>))
        .route("/health", get(health::<A>))
        .route("/metrics", get(metrics))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).timeout(Duration::from_secs(2)))
        .with_state(runtime);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind agent health http server");
            return;
        }
    };
    tracing::info!(%addr, "agent health endpoint listening");

    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        tracing::error!(error = %e, "agent health server error");
    }
}

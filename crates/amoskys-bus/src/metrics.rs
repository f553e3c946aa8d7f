//! Prometheus metrics for the bus, in `ioi-telemetry::prometheus`'s
//! `OnceCell<Collector>` + `install()` style.

use once_cell::sync::OnceCell;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};

static PUBLISH_ACKS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static GATE_REJECTIONS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static INFLIGHT: OnceCell<IntGauge> = OnceCell::new();
static DEDUP_HITS_TOTAL: OnceCell<prometheus::IntCounter> = OnceCell::new();
static PUBLISH_LATENCY_SECONDS: OnceCell<Histogram> = OnceCell::new();

/// Register every collector. Call once at process startup.
pub fn install() -> Result<(), prometheus::Error> {
    PUBLISH_ACKS_TOTAL
        .set(register_int_counter_vec!(
            "amoskys_bus_publish_acks_total",
            "Publish RPC replies by ack kind.",
            &["status"]
        )?)
        .expect("static already initialized");
    GATE_REJECTIONS_TOTAL
        .set(register_int_counter_vec!(
            "amoskys_bus_gate_rejections_total",
            "Rejections by the gate that fired.",
            &["gate"]
        )?)
        .expect("static already initialized");
    INFLIGHT
        .set(register_int_gauge!(
            "amoskys_bus_inflight",
            "Requests currently admitted and being processed."
        )?)
        .expect("static already initialized");
    DEDUP_HITS_TOTAL
        .set(prometheus::register_int_counter!(
            "amoskys_bus_dedup_hits_total",
            "Publish calls short-circuited by the dedup gate."
        )?)
        .expect("static already initialized");
    PUBLISH_LATENCY_SECONDS
        .set(register_histogram!(
            "amoskys_bus_publish_latency_seconds",
            "End-to-end Publish RPC handling latency."
        )?)
        .expect("static already initialized");
    Ok(())
}

pub fn record_ack(status: &str) {
    if let Some(c) = PUBLISH_ACKS_TOTAL.get() {
        c.with_label_values(&[status]).inc();
    }
}

pub fn record_gate_rejection(gate: &str) {
    if let Some(c) = GATE_REJECTIONS_TOTAL.get() {
        c.with_label_values(&[gate]).inc();
    }
}

pub fn inflight_gauge() -> Option<&'static IntGauge> {
    INFLIGHT.get()
}

pub fn record_dedup_hit() {
    if let Some(c) = DEDUP_HITS_TOTAL.get() {
        c.inc();
    }
}

pub fn observe_publish_latency(seconds: f64) {
    if let Some(h) = PUBLISH_LATENCY_SECONDS.get() {
        h.observe(seconds);
    }
}

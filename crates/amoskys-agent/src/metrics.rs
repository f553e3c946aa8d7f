//! Prometheus metrics for an agent process, same `OnceCell<Collector>` +
//! `install()` shape as the bus's `metrics.rs`.

use once_cell::sync::OnceCell;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter, IntCounterVec,
    IntGauge,
};

static PUBLISH_ACKS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static CIRCUIT_STATE: OnceCell<IntGauge> = OnceCell::new();
static LDQ_DEPTH: OnceCell<IntGauge> = OnceCell::new();
static LDQ_DRAINED_TOTAL: OnceCell<IntCounter> = OnceCell::new();

/// Register every collector. Call once at process startup.
pub fn install() -> Result<(), prometheus::Error> {
    PUBLISH_ACKS_TOTAL
        .set(register_int_counter_vec!(
            "amoskys_agent_publish_acks_total",
            "Publish attempts to the bus, by outcome.",
            &["status"]
        )?)
        .expect("static already initialized");
    CIRCUIT_STATE
        .set(register_int_gauge!(
            "amoskys_agent_circuit_state",
            "Circuit breaker state: 0=closed, 1=half_open, 2=open."
        )?)
        .expect("static already initialized");
    LDQ_DEPTH
        .set(register_int_gauge!(
            "amoskys_agent_ldq_depth",
            "Rows currently buffered in the local durable queue."
        )?)
        .expect("static already initialized");
    LDQ_DRAINED_TOTAL
        .set(register_int_counter!(
            "amoskys_agent_ldq_drained_total",
            "Rows successfully republished from the local durable queue."
        )?)
        .expect("static already initialized");
    Ok(())
}

pub fn record_ack(status: &str) {
    if let Some(c) = PUBLISH_ACKS_TOTAL.get() {
        c.with_label_values(&[status]).inc();
    }
}

pub fn set_circuit_state(state: amoskys_breaker::State) {
    let value = match state {
        amoskys_breaker::State::Closed => 0,
        amoskys_breaker::State::HalfOpen => 1,
        amoskys_breaker::State::Open => 2,
    };
    if let Some(g) = CIRCUIT_STATE.get() {
        g.set(value);
    }
}

pub fn set_ldq_depth(depth: usize) {
    if let Some(g) = LDQ_DEPTH.get() {
        g.set(depth as i64);
    }
}

pub fn record_ldq_drained(count: usize) {
    if count == 0 {
        return;
    }
    if let Some(c) = LDQ_DRAINED_TOTAL.get() {
        c.inc_by(count as u64);
    }
}

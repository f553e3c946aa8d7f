//! Prometheus metrics for the ingestor, same `OnceCell<Collector>` +
//! `install()` shape as the bus's `metrics.rs`.

use once_cell::sync::OnceCell;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

static POLLS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static EVENTS_INGESTED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static FUSION_EVALUATIONS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static INCIDENTS_RAISED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static RULE_FIRES_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static FUSION_EVAL_LATENCY_SECONDS: OnceCell<Histogram> = OnceCell::new();

pub fn install() -> Result<(), prometheus::Error> {
    POLLS_TOTAL
        .set(register_int_counter!(
            "amoskys_ingest_polls_total",
            "Source poll ticks completed."
        )?)
        .expect("static already initialized");
    EVENTS_INGESTED_TOTAL
        .set(register_int_counter_vec!(
            "amoskys_ingest_events_ingested_total",
            "Flattened view objects fed to the Fusion Engine, by source.",
            &["source"]
        )?)
        .expect("static already initialized");
    FUSION_EVALUATIONS_TOTAL
        .set(register_int_counter!(
            "amoskys_ingest_fusion_evaluations_total",
            "Fusion Engine evaluation passes run."
        )?)
        .expect("static already initialized");
    INCIDENTS_RAISED_TOTAL
        .set(register_int_counter!(
            "amoskys_ingest_incidents_raised_total",
            "New incidents persisted across all evaluation passes."
        )?)
        .expect("static already initialized");
    RULE_FIRES_TOTAL
        .set(register_int_counter_vec!(
            "amoskys_ingest_rule_fires_total",
            "Fusion correlation rule fires, by rule name.",
            &["rule"]
        )?)
        .expect("static already initialized");
    FUSION_EVAL_LATENCY_SECONDS
        .set(register_histogram!(
            "amoskys_ingest_fusion_eval_latency_seconds",
            "Wall-clock time of one evaluate_all_devices pass."
        )?)
        .expect("static already initialized");
    Ok(())
}

pub fn record_poll() {
    if let Some(c) = POLLS_TOTAL.get() {
        c.inc();
    }
}

pub fn record_events_ingested(source: &str, count: u64) {
    if count == 0 {
        return;
    }
    if let Some(c) = EVENTS_INGESTED_TOTAL.get() {
        c.with_label_values(&[source]).inc_by(count);
    }
}

pub fn record_fusion_evaluation() {
    if let Some(c) = FUSION_EVALUATIONS_TOTAL.get() {
        c.inc();
    }
}

pub fn record_incidents_raised(count: u64) {
    if count == 0 {
        return;
    }
    if let Some(c) = INCIDENTS_RAISED_TOTAL.get() {
        c.inc_by(count);
    }
}

pub fn record_rule_fire(rule: &str) {
    if let Some(c) = RULE_FIRES_TOTAL.get() {
        c.with_label_values(&[rule]).inc();
    }
}

pub fn observe_fusion_eval_latency(seconds: f64) {
    if let Some(h) = FUSION_EVAL_LATENCY_SECONDS.get() {
        h.observe(seconds);
    }
}

//! A minimal reference [`HardenedAgent`] that emits a synthetic CPU-load
//! metric envelope every cycle. Exists purely so the runtime is exercisable
//! end-to-end without a real collection probe (those stay out of scope).

use crate::runtime::HardenedAgent;
use amoskys_core::types::{Envelope, MetricEvent, MetricKind, MetricValue, Payload};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct HeartbeatAgent {
    device_id: String,
    sequence: AtomicU64,
}

impl HeartbeatAgent {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            sequence: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl HardenedAgent for HeartbeatAgent {
    async fn setup(&self) -> Result<(), String> {
        Ok(())
    }

    async fn collect_data(&self) -> Vec<Envelope> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let ts_ns = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        vec![Envelope::unsigned(
            "v1",
            ts_ns,
            format!("{}-heartbeat-{seq}", self.device_id),
            Payload::Metric(MetricEvent {
                name: "agent.heartbeat".into(),
                kind: MetricKind::Counter,
                value: MetricValue::Numeric(seq as f64),
                unit: "count".into(),
            }),
        )]
    }
}

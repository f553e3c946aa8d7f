//! Envelope and payload types for the AMOSKYS telemetry protocol.
//!
//! The payload is a tagged union (`Payload`) over the five event kinds the
//! core must preserve verbatim, plus a `DeviceTelemetry` wrapper used for
//! batched emission from a single device.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One signed, idempotent event-carrying unit.
///
/// `sig` and `prev_sig` are excluded from the canonical byte form used for
/// signing (see [`crate::canonical`]) so that re-signing never changes the
/// signed bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version tag.
    pub version: String,
    /// Producer wall-clock, nanoseconds.
    pub ts_ns: u64,
    /// Globally unique idempotency key for this logical event.
    pub idempotency_key: String,
    /// Exactly one payload variant.
    pub payload: Payload,
    /// Ed25519 signature over `canonical(self)`, 64 bytes when present.
    pub sig: Vec<u8>,
    /// Optional chain pointer to a prior envelope's signature.
    pub prev_sig: Option<Vec<u8>>,
}

impl Envelope {
    /// Construct an unsigned envelope (empty `sig`, no `prev_sig`).
    pub fn unsigned(version: impl Into<String>, ts_ns: u64, idempotency_key: impl Into<String>, payload: Payload) -> Self {
        Self {
            version: version.into(),
            ts_ns,
            idempotency_key: idempotency_key.into(),
            payload,
            sig: Vec::new(),
            prev_sig: None,
        }
    }

    /// Serialized size in bytes, used for the bus/LDQ size gates.
    pub fn encoded_len(&self) -> usize {
        postcard::to_allocvec(self).map(|b| b.len()).unwrap_or(usize::MAX)
    }
}

/// Severity used by correlation view objects and incidents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// Outcome of a security-relevant action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    Failure,
}

/// Security event category. `Other` keeps the accessor total without a
/// silent default branch: unknown categories are visible, not swallowed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityCategory {
    Authentication,
    Sudo,
    SshLogin,
    Other(String),
}

/// Audit event category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Change,
    Other(String),
}

/// Audit action performed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    Created,
    Modified,
    Deleted,
    Other(String),
}

/// Metric kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// Metric value: numeric or free-form text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    Numeric(f64),
    Text(String),
}

/// Network flow summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowEvent {
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: String,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub start_ts_ns: u64,
    pub end_ts_ns: u64,
}

/// Process creation/lifecycle event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessEvent {
    pub pid: u32,
    pub ppid: u32,
    pub executable_path: String,
    pub argv: Vec<String>,
    pub uid: u32,
    pub command_line: String,
}

/// Authentication/privilege security event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub category: SecurityCategory,
    pub action: String,
    pub outcome: Outcome,
    pub user: String,
    pub source_ip: String,
    pub risk_score: u32,
    pub mitre_techniques: Vec<String>,
}

/// Persistence/config-change audit event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub category: AuditCategory,
    pub action: AuditAction,
    pub object_type: String,
    pub object_id: String,
    pub before_value: Option<String>,
    pub after_value: Option<String>,
}

/// A named numeric or textual metric sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricEvent {
    pub name: String,
    pub kind: MetricKind,
    pub value: MetricValue,
    pub unit: String,
}

/// Device identity/metadata attached to a batched telemetry wrapper.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub manufacturer: String,
    pub model: String,
    pub ip: String,
}

/// One typed event inside a `DeviceTelemetry` batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event_id: String,
    pub event_timestamp_ns: u64,
    pub severity: Severity,
    pub attributes: BTreeMap<String, String>,
    pub body: Payload,
}

/// Batched emission from a single device: identity plus an ordered list of
/// typed events (any of the other payload kinds).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceTelemetry {
    pub device_id: String,
    pub device_type: String,
    pub protocol: String,
    pub metadata: DeviceMetadata,
    pub events: Vec<TelemetryEvent>,
}

/// Disposition the bus reports back for one `Publish` call (§6.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckStatus {
    Ok,
    Retry,
    Invalid,
    Error,
}

/// Wire-level reply to a `Publish(Envelope)` RPC.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublishAck {
    pub status: AckStatus,
    pub reason: Option<String>,
    /// Set on `RETRY`: how long the client should wait before retrying.
    pub backoff_hint_ms: Option<u64>,
}

impl PublishAck {
    pub fn ok() -> Self {
        Self {
            status: AckStatus::Ok,
            reason: None,
            backoff_hint_ms: None,
        }
    }

    pub fn rejected(status: AckStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: Some(reason.into()),
            backoff_hint_ms: None,
        }
    }

    pub fn retry(reason: impl Into<String>, backoff_hint_ms: u64) -> Self {
        Self {
            status: AckStatus::Retry,
            reason: Some(reason.into()),
            backoff_hint_ms: Some(backoff_hint_ms),
        }
    }
}

/// Tagged union over every event kind the core must preserve verbatim.
/// Exactly one variant is populated per envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Flow(FlowEvent),
    Process(ProcessEvent),
    Security(SecurityEvent),
    Audit(AuditEvent),
    Metric(MetricEvent),
    DeviceTelemetry(DeviceTelemetry),
}

impl Payload {
    /// Event-type tag as used by correlation view objects (§3.5).
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Flow(_) => "FLOW",
            Payload::Process(_) => "PROCESS",
            Payload::Security(_) => "SECURITY",
            Payload::Audit(_) => "AUDIT",
            Payload::Metric(_) => "METRIC",
            Payload::DeviceTelemetry(_) => "DEVICE_TELEMETRY",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_len_is_stable_for_equal_envelopes() {
        let env = Envelope::unsigned(
            "v1",
            1,
            "idem-1",
            Payload::Metric(MetricEvent {
                name: "cpu".into(),
                kind: MetricKind::Gauge,
                value: MetricValue::Numeric(0.5),
                unit: "ratio".into(),
            }),
        );
        assert_eq!(env.encoded_len(), env.clone().encoded_len());
    }
}

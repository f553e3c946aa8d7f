//! Correlation-facing data model: the flattened view objects the Fusion
//! Engine and Telemetry Ingestor exchange, plus the Incident and
//! Device Risk Snapshot records the Fusion Engine persists.

use crate::types::{AuditEvent, Envelope, FlowEvent, Payload, ProcessEvent, SecurityEvent, Severity, TelemetryEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// MITRE ATT&CK tactic codes used to tag incidents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MitreTactic {
    InitialAccess,
    Execution,
    Persistence,
    PrivilegeEscalation,
    DefenseEvasion,
    CredentialAccess,
    Discovery,
    LateralMovement,
    Collection,
    CommandAndControl,
    Exfiltration,
    Impact,
}

impl MitreTactic {
    /// Canonical `TA####` code.
    pub fn code(&self) -> &'static str {
        match self {
            MitreTactic::InitialAccess => "TA0001",
            MitreTactic::Execution => "TA0002",
            MitreTactic::Persistence => "TA0003",
            MitreTactic::PrivilegeEscalation => "TA0004",
            MitreTactic::DefenseEvasion => "TA0005",
            MitreTactic::CredentialAccess => "TA0006",
            MitreTactic::Discovery => "TA0007",
            MitreTactic::LateralMovement => "TA0008",
            MitreTactic::Collection => "TA0009",
            MitreTactic::CommandAndControl => "TA0011",
            MitreTactic::Exfiltration => "TA0010",
            MitreTactic::Impact => "TA0040",
        }
    }
}

/// Device risk classification level (§3.7 thresholds).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Map a clamped `[0,100]` score to its categorical level.
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s <= 30 => RiskLevel::Low,
            s if s <= 60 => RiskLevel::Medium,
            s if s <= 80 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }
}

/// Typed sub-body of a [`TelemetryEventView`]; at most one is populated,
/// matching the originating payload kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ViewBody {
    Security(SecurityEvent),
    Audit(AuditEvent),
    Process(ProcessEvent),
    Flow(FlowEvent),
    None,
}

/// Immutable, flattened view of a typed event used by correlation rules.
///
/// The fusion engine never holds wire-format envelopes; every event is
/// flattened into this shape on ingest (§3.5).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEventView {
    pub event_id: String,
    pub device_id: String,
    pub event_type: String,
    pub severity: Severity,
    pub timestamp_ns: u64,
    pub attributes: BTreeMap<String, String>,
    pub body: ViewBody,
}

/// Severity of a correlated incident.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IncidentSeverity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// A rule-emitted, MITRE-tagged finding spanning one or more events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub incident_id: String,
    pub device_id: String,
    pub severity: IncidentSeverity,
    pub tactics: Vec<MitreTactic>,
    pub techniques: Vec<String>,
    pub rule_name: String,
    pub summary: String,
    pub start_ts_ns: u64,
    pub end_ts_ns: u64,
    pub event_ids: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub created_at_ns: u64,
}

impl Incident {
    /// Fold in a contributing event, widening the time bounds and appending
    /// its id if not already present.
    pub fn add_event(&mut self, event_id: &str, event_ts_ns: u64) {
        if !self.event_ids.iter().any(|id| id == event_id) {
            self.event_ids.push(event_id.to_string());
        }
        if self.start_ts_ns == 0 || event_ts_ns < self.start_ts_ns {
            self.start_ts_ns = event_ts_ns;
        }
        if event_ts_ns > self.end_ts_ns {
            self.end_ts_ns = event_ts_ns;
        }
    }
}

impl TelemetryEventView {
    /// Flatten one batched event onto its device's view (§3.5).
    fn from_typed(device_id: &str, event: &TelemetryEvent) -> Self {
        let (event_type, body) = match &event.body {
            Payload::Security(sec) => ("SECURITY", ViewBody::Security(sec.clone())),
            Payload::Audit(audit) => ("AUDIT", ViewBody::Audit(audit.clone())),
            Payload::Process(proc) => ("PROCESS", ViewBody::Process(proc.clone())),
            Payload::Flow(flow) => ("FLOW", ViewBody::Flow(flow.clone())),
            Payload::Metric(_) | Payload::DeviceTelemetry(_) => ("METRIC", ViewBody::None),
        };
        TelemetryEventView {
            event_id: event.event_id.clone(),
            device_id: device_id.to_string(),
            event_type: event_type.to_string(),
            severity: event.severity,
            timestamp_ns: event.event_timestamp_ns,
            attributes: event.attributes.clone(),
            body,
        }
    }

    /// Flatten one wire envelope into the view objects the fusion engine
    /// consumes. Only `DeviceTelemetry` batches carry a device id, so only
    /// they expand into views (§4.7 step 2); every other payload kind is
    /// agent-local telemetry the fusion engine never sees.
    pub fn flatten_envelope(env: &Envelope) -> Vec<TelemetryEventView> {
        match &env.payload {
            Payload::DeviceTelemetry(batch) => batch
                .events
                .iter()
                .map(|e| TelemetryEventView::from_typed(&batch.device_id, e))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Current decayed risk score and categorical level for one device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceRiskSnapshot {
    pub device_id: String,
    pub score: i32,
    pub level: RiskLevel,
    pub reason_tags: Vec<String>,
    pub supporting_events: Vec<String>,
    pub updated_at_ns: u64,
    pub metadata: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_thresholds_match_spec() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(30), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(31), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(61), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(80), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(81), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Critical);
    }

    #[test]
    fn mitre_tactic_codes_are_stable() {
        assert_eq!(MitreTactic::InitialAccess.code(), "TA0001");
        assert_eq!(MitreTactic::Exfiltration.code(), "TA0010");
        assert_eq!(MitreTactic::Impact.code(), "TA0040");
    }

    #[test]
    fn flatten_envelope_expands_device_telemetry_batch() {
        use crate::types::{DeviceMetadata, DeviceTelemetry, Outcome, SecurityCategory};

        let batch = DeviceTelemetry {
            device_id: "dev-9".to_string(),
            device_type: "router".to_string(),
            protocol: "syslog".to_string(),
            metadata: DeviceMetadata::default(),
            events: vec![TelemetryEvent {
                event_id: "e1".to_string(),
                event_timestamp_ns: 42,
                severity: Severity::High,
                attributes: BTreeMap::new(),
                body: Payload::Security(SecurityEvent {
                    category: SecurityCategory::SshLogin,
                    action: "SSH".to_string(),
                    outcome: Outcome::Failure,
                    user: "root".to_string(),
                    source_ip: "203.0.113.1".to_string(),
                    risk_score: 0,
                    mitre_techniques: vec![],
                }),
            }],
        };
        let env = Envelope::unsigned("v1", 1, "idem-1", Payload::DeviceTelemetry(batch));

        let views = TelemetryEventView::flatten_envelope(&env);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].device_id, "dev-9");
        assert_eq!(views[0].event_type, "SECURITY");
        assert!(matches!(views[0].body, ViewBody::Security(_)));
    }

    #[test]
    fn flatten_envelope_ignores_non_device_telemetry_payloads() {
        use crate::types::{MetricEvent, MetricKind, MetricValue};

        let env = Envelope::unsigned(
            "v1",
            1,
            "idem-2",
            Payload::Metric(MetricEvent {
                name: "cpu".to_string(),
                kind: MetricKind::Gauge,
                value: MetricValue::Numeric(1.0),
                unit: "ratio".to_string(),
            }),
        );
        assert!(TelemetryEventView::flatten_envelope(&env).is_empty());
    }
}

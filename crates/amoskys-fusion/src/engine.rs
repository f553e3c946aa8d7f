//! The Fusion Engine itself (§4.8): owns every device's buffer, runs rules,
//! scores, and persists, one device at a time, catching and logging
//! per-device failures rather than aborting the whole pass (§4.8.5).

use crate::buffer::DeviceBuffer;
use crate::config::FusionConfig;
use crate::error::Result;
use crate::rules;
use crate::scoring::score_pass;
use crate::store::Store;
use amoskys_core::view::{DeviceRiskSnapshot, Incident, RiskLevel, TelemetryEventView};
use std::collections::HashMap;
use std::path::Path;

pub struct FusionEngine {
    buffers: HashMap<String, DeviceBuffer>,
    store: Store,
    config: FusionConfig,
}

impl FusionEngine {
    pub fn open(data_dir: impl AsRef<Path>, config: FusionConfig) -> Result<Self> {
        Ok(Self {
            buffers: HashMap::new(),
            store: Store::open(data_dir)?,
            config,
        })
    }

    /// Ingest one flattened event into its device's window (§4.8.1).
    pub fn add_event(&mut self, view: TelemetryEventView, now_ns: u64) {
        let buffer = self.buffers.entry(view.device_id.clone()).or_insert_with(DeviceBuffer::new);
        buffer.add_event(view, now_ns, self.config.window.as_nanos() as u64);
    }

    /// Run every rule plus scoring for one device and persist the result.
    /// Returns the incidents newly raised this pass (after dedup).
    fn evaluate_device(&mut self, device_id: &str, now_ns: u64) -> Result<Vec<Incident>> {
        let buffer = self.buffers.get_mut(device_id).expect("device_id came from buffers.keys()");
        let events = buffer.events_by_time();

        let mut fresh_incidents = Vec::new();
        for candidate in run_rules(&events, device_id, &self.config.rules, &buffer.known_source_ips) {
            let Some(earliest) = candidate.event_ids.first().cloned() else {
                continue;
            };
            if buffer.mark_incident_emitted(&candidate.rule_name, &earliest) {
                fresh_incidents.push(candidate);
            }
        }

        let mut incidents = Vec::with_capacity(fresh_incidents.len());
        for mut incident in fresh_incidents {
            incident.incident_id = format!("{}:{}:{}", incident.rule_name, device_id, incident.event_ids[0]);
            incident.created_at_ns = now_ns;
            buffer.incident_count += 1;
            if let Err(e) = self.store.upsert_incident(&incident) {
                tracing::error!(device_id, rule = %incident.rule_name, error = %e, "failed to persist incident");
            }
            incidents.push(incident);
        }

        let buffer = self.buffers.get_mut(device_id).expect("device exists");
        let reasons = score_pass(buffer, &events, &incidents, now_ns);
        buffer.last_evaluation_ns = now_ns;

        let snapshot = DeviceRiskSnapshot {
            device_id: device_id.to_string(),
            score: buffer.score,
            level: RiskLevel::from_score(buffer.score),
            reason_tags: reasons,
            supporting_events: events.iter().map(|e| e.event_id.clone()).collect(),
            updated_at_ns: now_ns,
            metadata: Default::default(),
        };
        if let Err(e) = self.store.put_device_risk(&snapshot) {
            tracing::error!(device_id, error = %e, "failed to persist device risk snapshot");
        }

        Ok(incidents)
    }

    /// Evaluate every device with a live buffer; a failure evaluating one
    /// device is logged and does not stop the rest (§4.8.5). Returns every
    /// incident freshly raised this pass, across all devices.
    pub fn evaluate_all_devices(&mut self, now_ns: u64) -> Vec<Incident> {
        let device_ids: Vec<String> = self.buffers.keys().cloned().collect();
        let mut raised = Vec::new();
        for device_id in device_ids {
            match self.evaluate_device(&device_id, now_ns) {
                Ok(incidents) => raised.extend(incidents),
                Err(e) => tracing::error!(device_id, error = %e, "fusion evaluation failed for device"),
            }
        }
        raised
    }

    pub fn device_risk(&self, device_id: &str) -> Option<&DeviceBuffer> {
        self.buffers.get(device_id)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

fn run_rules(
    events: &[&TelemetryEventView],
    device_id: &str,
    cfg: &rules::RuleConfig,
    known_ips: &std::collections::HashSet<String>,
) -> Vec<Incident> {
    let mut hits = Vec::new();
    if let Some(i) = rules::ssh_brute_force(events, device_id, cfg) {
        hits.push(i);
    }
    if let Some(i) = rules::persistence_after_auth(events, device_id) {
        hits.push(i);
    }
    if let Some(i) = rules::suspicious_sudo(events, device_id) {
        hits.push(i);
    }
    if let Some(i) = rules::multi_tactic_attack(events, device_id) {
        hits.push(i);
    }
    if let Some(i) = rules::credential_dumping_chain(events, device_id) {
        hits.push(i);
    }
    if let Some(i) = rules::log_tampering(events, device_id) {
        hits.push(i);
    }
    if let Some(i) = rules::security_tool_disable(events, device_id) {
        hits.push(i);
    }
    if let Some(i) = rules::fileless_attack(events, device_id) {
        hits.push(i);
    }
    if let Some(i) = rules::staged_exfiltration(events, device_id, cfg, known_ips) {
        hits.push(i);
    }
    if let Some(i) = rules::internal_reconnaissance(events, device_id) {
        hits.push(i);
    }
    if let Some(i) = rules::ssh_key_theft_and_pivot(events, device_id) {
        hits.push(i);
    }
    if let Some(i) = rules::apt_initial_access_chain(events, device_id) {
        hits.push(i);
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use amoskys_core::types::{Outcome, SecurityCategory, SecurityEvent, Severity};
    use amoskys_core::view::ViewBody;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn sec_view(id: &str, device: &str, ts: u64, category: SecurityCategory, action: &str, outcome: Outcome, ip: &str) -> TelemetryEventView {
        TelemetryEventView {
            event_id: id.to_string(),
            device_id: device.to_string(),
            event_type: "SECURITY".to_string(),
            severity: Severity::Medium,
            timestamp_ns: ts,
            attributes: BTreeMap::new(),
            body: ViewBody::Security(SecurityEvent {
                category,
                action: action.to_string(),
                outcome,
                user: "admin".to_string(),
                source_ip: ip.to_string(),
                risk_score: 0,
                mitre_techniques: vec![],
            }),
        }
    }

    #[test]
    fn ssh_brute_force_to_compromise_scenario() {
        let dir = tempdir().unwrap();
        let mut engine = FusionEngine::open(dir.path(), FusionConfig::default()).unwrap();

        const SEC: u64 = 1_000_000_000;
        engine.add_event(
            sec_view("a", "dev-1", 0, SecurityCategory::SshLogin, "SSH", Outcome::Failure, "203.0.113.42"),
            15 * SEC,
        );
        engine.add_event(
            sec_view("b", "dev-1", 5 * SEC, SecurityCategory::SshLogin, "SSH", Outcome::Failure, "203.0.113.42"),
            15 * SEC,
        );
        engine.add_event(
            sec_view("c", "dev-1", 10 * SEC, SecurityCategory::SshLogin, "SSH", Outcome::Failure, "203.0.113.42"),
            15 * SEC,
        );
        engine.add_event(
            sec_view("d", "dev-1", 15 * SEC, SecurityCategory::SshLogin, "SSH", Outcome::Success, "203.0.113.42"),
            15 * SEC,
        );

        let incidents = engine.evaluate_device("dev-1", 15 * SEC).unwrap();
        assert!(incidents.iter().any(|i| i.rule_name == "ssh_brute_force"));

        let buffer = engine.device_risk("dev-1").unwrap();
        // base 10 + 15 (3 failed ssh, capped at 20) + 15 (new-ip success)
        // + 20 (HIGH incident bonus, ssh_brute_force) = 60
        assert_eq!(buffer.score, 60);
        assert_eq!(RiskLevel::from_score(buffer.score), RiskLevel::Medium);
    }

    #[test]
    fn second_pass_does_not_reraise_the_same_incident() {
        let dir = tempdir().unwrap();
        let mut engine = FusionEngine::open(dir.path(), FusionConfig::default()).unwrap();

        for (i, ts) in [0u64, 1, 2, 3, 4].into_iter().enumerate() {
            engine.add_event(
                sec_view(&format!("e{i}"), "dev-1", ts, SecurityCategory::SshLogin, "SSH", Outcome::Failure, "203.0.113.42"),
                10,
            );
        }

        let first = engine.evaluate_device("dev-1", 10).unwrap();
        assert_eq!(first.len(), 1);

        let second = engine.evaluate_device("dev-1", 20).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn persistence_after_auth_scenario() {
        use amoskys_core::types::{AuditAction, AuditCategory, AuditEvent};
        use amoskys_core::view::ViewBody as VB;

        let dir = tempdir().unwrap();
        let mut engine = FusionEngine::open(dir.path(), FusionConfig::default()).unwrap();

        let login = sec_view("login", "dev-2", 0, SecurityCategory::SshLogin, "SSH", Outcome::Success, "198.51.100.7");
        let persistence = TelemetryEventView {
            event_id: "plist".to_string(),
            device_id: "dev-2".to_string(),
            event_type: "AUDIT".to_string(),
            severity: Severity::High,
            timestamp_ns: 60 * 1_000_000_000,
            attributes: BTreeMap::new(),
            body: VB::Audit(AuditEvent {
                category: AuditCategory::Change,
                action: AuditAction::Created,
                object_type: "LAUNCH_AGENT".to_string(),
                object_id: "/Users/x/Library/LaunchAgents/com.evil.plist".to_string(),
                before_value: None,
                after_value: None,
            }),
        };

        engine.add_event(login, 60 * 1_000_000_000);
        engine.add_event(persistence, 60 * 1_000_000_000);

        let incidents = engine.evaluate_device("dev-2", 60 * 1_000_000_000).unwrap();
        assert!(incidents.iter().any(|i| i.rule_name == "persistence_after_auth"));

        let buffer = engine.device_risk("dev-2").unwrap();
        // base 10 + 15 (new-ip ssh success) + 25 (new persistence artifact)
        // + 20 (HIGH incident bonus, persistence_after_auth) = 70
        assert_eq!(buffer.score, 70);
        assert_eq!(RiskLevel::from_score(buffer.score), RiskLevel::High);
    }

    #[test]
    fn suspicious_sudo_scenario() {
        let dir = tempdir().unwrap();
        let mut engine = FusionEngine::open(dir.path(), FusionConfig::default()).unwrap();

        engine.add_event(
            sec_view("s", "dev-3", 0, SecurityCategory::Sudo, "vim /etc/sudoers", Outcome::Success, ""),
            1,
        );

        let incidents = engine.evaluate_device("dev-3", 1).unwrap();
        assert!(incidents.iter().any(|i| i.rule_name == "suspicious_sudo"));

        let buffer = engine.device_risk("dev-3").unwrap();
        // base 10 + 30 (dangerous sudo) + 40 (CRITICAL incident bonus) = 80
        assert_eq!(buffer.score, 80);
        assert_eq!(RiskLevel::from_score(buffer.score), RiskLevel::High);
    }
}

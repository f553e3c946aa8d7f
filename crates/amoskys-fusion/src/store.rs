//! Incident and device-risk persistence (§4.8.4), on `sled` rather than a
//! SQL database, consistent with the LDQ/bus write-ahead log choice.

use crate::error::Result;
use amoskys_core::view::{DeviceRiskSnapshot, Incident};
use std::path::Path;

const TREE_INCIDENTS: &str = "incidents";
const TREE_DEVICE_RISK: &str = "device_risk";

pub struct Store {
    incidents: sled::Tree,
    device_risk: sled::Tree,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            incidents: db.open_tree(TREE_INCIDENTS)?,
            device_risk: db.open_tree(TREE_DEVICE_RISK)?,
        })
    }

    /// Upsert by `incident_id`. Write failures are logged by the caller,
    /// never propagated past `evaluate_device` — in-memory state stays
    /// authoritative until the next successful write (§4.8.4).
    pub fn upsert_incident(&self, incident: &Incident) -> Result<()> {
        self.incidents
            .insert(incident.incident_id.as_bytes(), postcard::to_allocvec(incident)?)?;
        Ok(())
    }

    /// Replace-by-`device_id`.
    pub fn put_device_risk(&self, snapshot: &DeviceRiskSnapshot) -> Result<()> {
        self.device_risk
            .insert(snapshot.device_id.as_bytes(), postcard::to_allocvec(snapshot)?)?;
        Ok(())
    }

    pub fn get_device_risk(&self, device_id: &str) -> Result<Option<DeviceRiskSnapshot>> {
        match self.device_risk.get(device_id.as_bytes())? {
            Some(bytes) => Ok(Some(postcard::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_incident(&self, incident_id: &str) -> Result<Option<Incident>> {
        match self.incidents.get(incident_id.as_bytes())? {
            Some(bytes) => Ok(Some(postcard::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn incident_count(&self) -> usize {
        self.incidents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amoskys_core::view::{IncidentSeverity, RiskLevel};
    use tempfile::tempdir;

    fn incident(id: &str) -> Incident {
        Incident {
            incident_id: id.to_string(),
            device_id: "dev-1".to_string(),
            severity: IncidentSeverity::High,
            tactics: vec![],
            techniques: vec![],
            rule_name: "ssh_brute_force".to_string(),
            summary: "test".to_string(),
            start_ts_ns: 0,
            end_ts_ns: 1,
            event_ids: vec!["a".to_string()],
            metadata: Default::default(),
            created_at_ns: 0,
        }
    }

    #[test]
    fn incident_upsert_replaces_by_id() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let mut inc = incident("inc-1");
        store.upsert_incident(&inc).unwrap();
        inc.summary = "updated".to_string();
        store.upsert_incident(&inc).unwrap();

        assert_eq!(store.incident_count(), 1);
        assert_eq!(store.get_incident("inc-1").unwrap().unwrap().summary, "updated");
    }

    #[test]
    fn device_risk_replace_by_device_id() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let snap = DeviceRiskSnapshot {
            device_id: "dev-1".to_string(),
            score: 40,
            level: RiskLevel::Medium,
            reason_tags: vec![],
            supporting_events: vec![],
            updated_at_ns: 1,
            metadata: Default::default(),
        };
        store.put_device_risk(&snap).unwrap();
        let loaded = store.get_device_risk("dev-1").unwrap().unwrap();
        assert_eq!(loaded.score, 40);
    }
}

//! Per-device sliding window of correlation-facing events (§4.8, §4.8.1).

use amoskys_core::view::{TelemetryEventView, ViewBody};
use std::collections::HashSet;

/// Per-device state the Fusion Engine keeps in process memory (§4.8).
#[derive(Debug, Default)]
pub struct DeviceBuffer {
    pub events: Vec<TelemetryEventView>,
    pub score: i32,
    pub last_evaluation_ns: u64,
    pub known_source_ips: HashSet<String>,
    pub incident_count: u64,
    /// `rule_name:earliest_event_id` keys already emitted as an incident,
    /// so a rule whose earliest contributing event is still in the window
    /// on a later pass doesn't raise a second, identical incident.
    pub emitted_incident_keys: HashSet<String>,
}

impl DeviceBuffer {
    /// A first-seen device starts at score 10, not 0 (original behavior;
    /// spec is silent, decision recorded in DESIGN.md).
    pub fn new() -> Self {
        Self {
            score: 10,
            ..Default::default()
        }
    }

    /// Append `view`, prune anything older than `now_ns - window_ns`, and
    /// union any source IP it carries into the known-IP set (§4.8.1).
    pub fn add_event(&mut self, view: TelemetryEventView, now_ns: u64, window_ns: u64) {
        if let ViewBody::Security(sec) = &view.body {
            if !sec.source_ip.is_empty() {
                self.known_source_ips.insert(sec.source_ip.clone());
            }
        }
        self.events.push(view);
        self.prune(now_ns, window_ns);
    }

    fn prune(&mut self, now_ns: u64, window_ns: u64) {
        let cutoff = now_ns.saturating_sub(window_ns);
        self.events.retain(|e| e.timestamp_ns >= cutoff);

        let present: HashSet<&str> = self.events.iter().map(|e| e.event_id.as_str()).collect();
        self.emitted_incident_keys
            .retain(|key| key.split(':').next_back().is_some_and(|id| present.contains(id)));
    }

    /// Record that `rule_name`'s incident rooted at `earliest_event_id` has
    /// already been raised. Returns `true` if this is a fresh firing.
    pub fn mark_incident_emitted(&mut self, rule_name: &str, earliest_event_id: &str) -> bool {
        self.emitted_incident_keys
            .insert(format!("{rule_name}:{earliest_event_id}"))
    }

    /// Events in the current window, ordered by timestamp (not arrival
    /// order) — rules see a consistent chronology regardless of the order
    /// the ingestor happened to read rows in.
    pub fn events_by_time(&self) -> Vec<&TelemetryEventView> {
        let mut v: Vec<&TelemetryEventView> = self.events.iter().collect();
        v.sort_by_key(|e| e.timestamp_ns);
        v
    }
}

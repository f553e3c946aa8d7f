//! Additive, clamped risk scoring (§4.8.3).

use crate::buffer::DeviceBuffer;
use amoskys_core::types::{AuditAction, Outcome, SecurityCategory};
use amoskys_core::view::{IncidentSeverity, Incident, ViewBody};

const DANGEROUS_SUDO_PATTERNS: &[&str] = &["rm -rf", "/etc/sudoers", "launchagents", "launchdaemons"];
const LOOPBACK_ADDRESSES: &[&str] = &["127.0.0.1", "localhost", "::1"];
const MAX_REASON_TAGS: usize = 10;
const DECAY_INTERVAL_NS: u64 = 600_000_000_000;
const DECAY_DELTA: i32 = -10;

/// Apply one evaluation pass's scoring deltas to `buffer.score`, in place.
/// "Previously-unseen IP" is judged the same way the original does: any
/// non-loopback source, not a diff against accumulated history — a
/// deliberate choice, see the scoring-double-counting decision in
/// DESIGN.md.
pub fn score_pass(
    buffer: &mut DeviceBuffer,
    events: &[&amoskys_core::view::TelemetryEventView],
    incidents_this_pass: &[Incident],
    now_ns: u64,
) -> Vec<String> {
    let mut reasons = Vec::new();
    let mut delta = 0i32;

    let failed_ssh = events
        .iter()
        .filter(|e| {
            matches!(&e.body, ViewBody::Security(sec)
                if sec.action.eq_ignore_ascii_case("SSH") && sec.outcome == Outcome::Failure)
        })
        .count();
    if failed_ssh > 0 {
        let d = (5 * failed_ssh as i32).min(20);
        delta += d;
        push_reason(&mut reasons, format!("{failed_ssh} failed SSH login(s) (+{d})"));
    }

    let new_ip_logins = events.iter().filter(|e| {
        matches!(&e.body, ViewBody::Security(sec)
            if sec.category == SecurityCategory::SshLogin
                && sec.outcome == Outcome::Success
                && !sec.source_ip.is_empty()
                && !LOOPBACK_ADDRESSES.contains(&sec.source_ip.as_str()))
    });
    for e in new_ip_logins {
        delta += 15;
        push_reason(&mut reasons, format!("successful SSH login from new IP (event {})", e.event_id));
    }

    let new_ssh_keys = events.iter().filter(|e| {
        matches!(&e.body, ViewBody::Audit(audit)
            if audit.action == AuditAction::Created && audit.object_type.eq_ignore_ascii_case("SSH_KEYS"))
    });
    for e in new_ssh_keys {
        delta += 30;
        push_reason(&mut reasons, format!("new SSH key audited (event {})", e.event_id));
    }

    let new_persistence = events.iter().filter(|e| {
        matches!(&e.body, ViewBody::Audit(audit)
            if audit.action == AuditAction::Created
                && (audit.object_id.to_lowercase().contains("launchagent")
                    || audit.object_id.to_lowercase().contains("launchdaemon")
                    || audit.object_id.to_lowercase().contains("loginitem")))
    });
    for e in new_persistence {
        delta += 25;
        push_reason(&mut reasons, format!("new launch-agent/login-item artifact (event {})", e.event_id));
    }

    let suspicious_sudo = events.iter().filter(|e| {
        matches!(&e.body, ViewBody::Security(sec)
            if sec.category == SecurityCategory::Sudo
                && DANGEROUS_SUDO_PATTERNS.iter().any(|p| sec.action.to_lowercase().contains(p)))
    });
    for e in suspicious_sudo {
        delta += 30;
        push_reason(&mut reasons, format!("suspicious sudo command (event {})", e.event_id));
    }

    for incident in incidents_this_pass {
        match incident.severity {
            IncidentSeverity::High => {
                delta += 20;
                push_reason(&mut reasons, format!("HIGH incident {} raised", incident.rule_name));
            }
            IncidentSeverity::Critical => {
                delta += 40;
                push_reason(&mut reasons, format!("CRITICAL incident {} raised", incident.rule_name));
            }
            _ => {}
        }
    }

    if delta == 0 && reasons.is_empty() {
        let elapsed = now_ns.saturating_sub(buffer.last_evaluation_ns);
        let decay_steps = (elapsed / DECAY_INTERVAL_NS) as i32;
        if decay_steps > 0 {
            delta += DECAY_DELTA * decay_steps;
            push_reason(&mut reasons, "risk decay (no new risky events this pass)".to_string());
        }
    }

    buffer.score = (buffer.score + delta).clamp(0, 100);
    reasons
}

fn push_reason(reasons: &mut Vec<String>, reason: String) {
    if reasons.len() < MAX_REASON_TAGS {
        reasons.push(reason);
    }
}

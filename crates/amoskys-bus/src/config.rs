//! Bus configuration: `clap::Parser` struct with per-option env fallback.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OverloadMode {
    On,
    Off,
    Auto,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "busd")]
#[command(about = "AMOSKYS Event Bus server")]
pub struct Config {
    /// QUIC listen address for the Publish RPC
    #[arg(long, default_value = "0.0.0.0:9443", env = "AMOSKYS_BUS_LISTEN")]
    pub listen: SocketAddr,

    /// Directory holding mTLS certificate material (ca.crt, bus.crt, bus.key)
    #[arg(long, default_value = "./certs", env = "AMOSKYS_CERT_DIR")]
    pub cert_dir: PathBuf,

    /// Directory for the write-ahead log
    #[arg(long, default_value = "./data/bus-wal", env = "AMOSKYS_BUS_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Path to the trust map file: one `common_name public_key_pem_path` per line
    #[arg(long, env = "AMOSKYS_TRUST_MAP")]
    pub trust_map: PathBuf,

    /// Maximum serialized envelope size accepted by the size gate
    #[arg(long, default_value = "1048576", env = "AMOSKYS_MAX_ENV_BYTES")]
    pub max_env_bytes: usize,

    /// Soft inflight-request ceiling before RETRY
    #[arg(long, default_value = "50", env = "AMOSKYS_MAX_INFLIGHT")]
    pub max_inflight: usize,

    /// Hard ceiling protecting the inflight counter from abuse
    #[arg(long, default_value = "200", env = "AMOSKYS_HARD_MAX")]
    pub hard_max: usize,

    /// Dedup window, seconds
    #[arg(long, default_value = "300", env = "AMOSKYS_DEDUPE_TTL_SEC")]
    pub dedupe_ttl_sec: u64,

    /// Dedup table capacity
    #[arg(long, default_value = "100000", env = "AMOSKYS_DEDUPE_MAX")]
    pub dedupe_max: usize,

    /// `on` always returns RETRY, `off` never does, `auto` checks the
    /// runtime overload flag (toggled via SIGUSR1/SIGUSR2 or the admin
    /// endpoint in a fuller deployment; here, an explicit config flip)
    #[arg(long, value_enum, default_value = "off", env = "AMOSKYS_OVERLOAD_MODE")]
    pub overload_mode: OverloadMode,

    /// Backoff hint, milliseconds, given to clients on RETRY
    #[arg(long, default_value = "2000", env = "AMOSKYS_RETRY_BACKOFF_HINT_MS")]
    pub retry_backoff_hint_ms: u64,

    /// Bind address for liveness/readiness/metrics
    #[arg(long, default_value = "127.0.0.1:9444", env = "AMOSKYS_BUS_HEALTH_ADDR")]
    pub health_addr: SocketAddr,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_inflight == 0 {
            anyhow::bail!("max_inflight must be > 0");
        }
        if self.hard_max < self.max_inflight {
            anyhow::bail!("hard_max must be >= max_inflight");
        }
        Ok(())
    }
}

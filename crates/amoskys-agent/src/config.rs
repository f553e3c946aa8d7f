//! Agent configuration: `clap::Parser` structs with per-option env
//! fallback, companion `validate()` method.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "amoskys-agentd")]
#[command(about = "AMOSKYS hardened agent runtime")]
pub struct Config {
    /// Unique agent identifier, e.g. "proc_agent"
    #[arg(long, env = "AMOSKYS_AGENT_NAME")]
    pub agent_name: String,

    /// Device/host identifier this agent reports on
    #[arg(long, env = "AMOSKYS_DEVICE_ID")]
    pub device_id: String,

    /// Seconds between collection cycles
    #[arg(long, default_value = "10", env = "AMOSKYS_COLLECTION_INTERVAL_SECS")]
    pub collection_interval_secs: u64,

    /// Directory holding this agent's local durable queue
    #[arg(long, default_value = "./data/ldq", env = "AMOSKYS_LDQ_DIR")]
    pub ldq_dir: PathBuf,

    /// Directory holding mTLS certificate material (ca.crt, agent.crt, agent.key)
    #[arg(long, default_value = "./certs", env = "AMOSKYS_CERT_DIR")]
    pub cert_dir: PathBuf,

    /// Event Bus address to publish to
    #[arg(long, env = "AMOSKYS_BUS_ADDR")]
    pub bus_addr: SocketAddr,

    /// Bind address for the agent's own health/metrics HTTP surface
    #[arg(long, default_value = "127.0.0.1:9300", env = "AMOSKYS_HEALTH_ADDR")]
    pub health_addr: SocketAddr,

    /// Log format: json or pretty
    #[arg(long, default_value = "pretty", env = "AMOSKYS_LOG_FORMAT")]
    pub log_format: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.agent_name.trim().is_empty() {
            anyhow::bail!("agent_name cannot be empty");
        }
        if self.device_id.trim().is_empty() {
            anyhow::bail!("device_id cannot be empty");
        }
        Ok(())
    }
}

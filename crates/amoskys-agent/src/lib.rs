//! AMOSKYS Agent
//!
//! The Hardened Agent Runtime (C5): a collect/validate/enrich/publish loop
//! shared by every agent, with circuit-breaker protection and local-queue
//! fallback when the bus is unreachable.

pub mod config;
pub mod error;
pub mod health_http;
pub mod heartbeat;
pub mod metrics;
pub mod net_publisher;
pub mod runtime;

pub use config::Config;
pub use error::{AgentError, Result};
pub use heartbeat::HeartbeatAgent;
pub use net_publisher::QuicPublisher;
pub use runtime::{AgentRuntime, HardenedAgent, HealthSummary, Publisher, RetryPolicy, ValidationResult};

pub mod admission;
pub mod config;
pub mod dedup;
pub mod error;
pub mod gates;
pub mod health_http;
pub mod metrics;
pub mod server;

pub use admission::{AdmissionControl, AdmissionGuard};
pub use config::{Config, OverloadMode};
pub use dedup::DedupMap;
pub use error::{BusError, Result};
pub use gates::BusState;

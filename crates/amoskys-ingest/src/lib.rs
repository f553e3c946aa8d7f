//! Telemetry Ingestor (C7): polls agent LDQ directories and the bus's
//! write-ahead log, flattens fresh rows into correlation views, and drives
//! the Fusion Engine on its own cadence.

pub mod config;
pub mod error;
pub mod health_http;
pub mod ingestor;
pub mod metrics;
pub mod seen;
pub mod source;

pub use config::Config;
pub use error::{IngestError, Result};
pub use ingestor::{HealthSummary, Ingestor};
pub use seen::SeenSet;

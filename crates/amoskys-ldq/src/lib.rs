//! AMOSKYS LDQ
//!
//! The per-agent local durable queue: an at-least-once FIFO that buffers
//! signed envelopes on disk between collection and publish, so an agent can
//! survive a bus outage without losing events.

pub mod error;
pub mod queue;

pub use error::{LdqError, Result};
pub use queue::{Ack, EnqueueOutcome, PublishCallError, Queue, QueueRecord};

//! Hardened Agent Runtime (C5): the collect -> validate -> enrich -> publish
//! loop every AMOSKYS agent shares, ported from the Python
//! `HardenedAgentBase` into a trait + driver split (the driver holds the
//! loop; the trait methods are supplied by the concrete agent).

use amoskys_breaker::CircuitBreaker;
use amoskys_core::types::Envelope;
use amoskys_ldq::{Ack, PublishCallError, Queue};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Result of validating one collected event.
#[derive(Clone, Debug, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn reject(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }
}

/// An EventBus client capable of publishing a batch of envelopes.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, events: &[Envelope]) -> std::result::Result<(), PublishCallError>;
}

/// Lifecycle hooks a concrete agent supplies. Only `setup` and
/// `collect_data` are mandatory; the rest default to accept-everything /
/// no-op behavior.
#[async_trait]
pub trait HardenedAgent: Send + Sync {
    /// Initialize resources. Returning `Err` aborts startup.
    async fn setup(&self) -> Result<(), String>;

    /// Gather raw telemetry for one cycle. Exceptions here are caught by
    /// the driver and logged; they do not stop the loop.
    async fn collect_data(&self) -> Vec<Envelope>;

    /// Validate one collected event. Default: accept everything.
    fn validate_event(&self, _event: &Envelope) -> ValidationResult {
        ValidationResult::ok()
    }

    /// Attach contextual metadata to a validated event. Default: identity.
    fn enrich_event(&self, event: Envelope) -> Envelope {
        event
    }

    /// Best-effort cleanup on shutdown. Default: no-op.
    async fn shutdown(&self) {}
}

/// Point-in-time health snapshot, exposed over the agent's `/healthz`-style
/// surface (§4.5 of the expanded spec).
#[derive(Clone, Debug, serde::Serialize)]
pub struct HealthSummary {
    pub agent_name: String,
    pub device_id: String,
    pub uptime_seconds: u64,
    pub collection_count: u64,
    pub error_count: u64,
    pub circuit_breaker_state: &'static str,
    pub local_queue_size: usize,
    pub last_error: Option<String>,
}

/// Tunables for the publish-with-retry path (§4.5): exponential backoff
/// with a cap.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(200),
            backoff_cap: Duration::from_secs(5),
        }
    }
}

/// Drives a [`HardenedAgent`] through its lifecycle: setup, a collect /
/// validate / enrich / publish loop with circuit-breaker protection and
/// local-queue fallback, and graceful shutdown on SIGTERM/SIGINT.
pub struct AgentRuntime<A: HardenedAgent> {
    agent_name: String,
    device_id: String,
    collection_interval: Duration,
    agent: A,
    publisher: Box<dyn Publisher>,
    local_queue: Queue,
    circuit_breaker: CircuitBreaker,
    retry_policy: RetryPolicy,
    max_env_bytes: usize,
    max_queue_bytes: u64,

    start: Instant,
    collection_count: AtomicU64,
    error_count: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl<A: HardenedAgent> AgentRuntime<A> {
    pub fn new(
        agent_name: impl Into<String>,
        device_id: impl Into<String>,
        collection_interval: Duration,
        agent: A,
        publisher: Box<dyn Publisher>,
        local_queue: Queue,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            device_id: device_id.into(),
            collection_interval,
            agent,
            publisher,
            local_queue,
            circuit_breaker: CircuitBreaker::with_defaults(),
            retry_policy: RetryPolicy::default(),
            max_env_bytes: 1 << 20,
            max_queue_bytes: 64 << 20,
            start: Instant::now(),
            collection_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    pub fn health_summary(&self) -> HealthSummary {
        let state = match self.circuit_breaker.state() {
            amoskys_breaker::State::Closed => "CLOSED",
            amoskys_breaker::State::Open => "OPEN",
            amoskys_breaker::State::HalfOpen => "HALF_OPEN",
        };
        HealthSummary {
            agent_name: self.agent_name.clone(),
            device_id: self.device_id.clone(),
            uptime_seconds: self.start.elapsed().as_secs(),
            collection_count: self.collection_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            circuit_breaker_state: state,
            local_queue_size: self.local_queue.size(),
            last_error: self.last_error.lock().clone(),
        }
    }

    async fn publish_with_circuit_breaker(&self, events: &[Envelope]) -> std::result::Result<(), PublishCallError> {
        self.circuit_breaker
            .allow_call()
            .map_err(|_| PublishCallError("circuit breaker is open".into()))?;

        let result = match self.publisher.publish(events).await {
            Ok(()) => {
                self.circuit_breaker.record_success();
                crate::metrics::record_ack("ok");
                Ok(())
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                crate::metrics::record_ack("err");
                Err(e)
            }
        };
        crate::metrics::set_circuit_state(self.circuit_breaker.state());
        result
    }

    /// Publish with exponential backoff, falling back to the local queue
    /// when the circuit is open or retries are exhausted.
    async fn publish_with_retry(&self, events: &[Envelope]) {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.publish_with_circuit_breaker(events).await {
                Ok(()) => return,
                Err(e) => {
                    if self.circuit_breaker.state() == amoskys_breaker::State::Open {
                        tracing::warn!(agent = %self.agent_name, events = events.len(), %e, "circuit open; enqueueing locally");
                        self.enqueue_locally(events);
                        return;
                    }

                    tracing::error!(agent = %self.agent_name, attempt, max = self.retry_policy.max_retries, %e, "publish attempt failed");
                    if attempt >= self.retry_policy.max_retries {
                        self.enqueue_locally(events);
                        return;
                    }

                    let backoff = self.retry_policy.backoff_base * 2u32.pow(attempt - 1);
                    tokio::time::sleep(backoff.min(self.retry_policy.backoff_cap)).await;
                }
            }
        }
    }

    fn enqueue_locally(&self, events: &[Envelope]) {
        for env in events {
            match self
                .local_queue
                .enqueue(env, self.max_env_bytes, self.max_queue_bytes)
            {
                Ok(_) => {}
                Err(e) => tracing::error!(agent = %self.agent_name, %e, "failed to enqueue event locally"),
            }
        }
        crate::metrics::set_ldq_depth(self.local_queue.size());
    }

    /// Drain queued events back to the bus, stopping at the first failure
    /// so a recovering bus isn't immediately hammered again.
    fn drain_local_queue(&self, limit: usize) -> usize {
        let handle = tokio::runtime::Handle::current();
        let publisher = &self.publisher;
        let breaker = &self.circuit_breaker;

        let drained = self
            .local_queue
            .drain(
                |env| {
                    let envs = std::slice::from_ref(env);
                    if breaker.allow_call().is_err() {
                        return Err(PublishCallError("circuit breaker is open".into()));
                    }
                    let result = handle.block_on(publisher.publish(envs));
                    match &result {
                        Ok(()) => breaker.record_success(),
                        Err(_) => breaker.record_failure(),
                    }
                    result.map(|_| Ack::Ok)
                },
                limit,
                self.retry_policy.max_retries,
            )
            .unwrap_or(0);

        crate::metrics::record_ldq_drained(drained);
        crate::metrics::set_ldq_depth(self.local_queue.size());
        drained
    }

    async fn run_one_cycle(&self) {
        self.collection_count.fetch_add(1, Ordering::Relaxed);
        let cycle_start = Instant::now();

        let raw_events = self.agent.collect_data().await;
        let mut validated = Vec::with_capacity(raw_events.len());
        let mut rejected = 0usize;

        for ev in raw_events.into_iter() {
            let result = self.agent.validate_event(&ev);
            if result.is_valid {
                validated.push(ev);
            } else {
                rejected += 1;
                tracing::debug!(agent = %self.agent_name, errors = ?result.errors, "rejected event");
            }
        }

        let enriched: Vec<Envelope> = validated
            .into_iter()
            .map(|ev| self.agent.enrich_event(ev))
            .collect();

        if !enriched.is_empty() {
            self.publish_with_retry(&enriched).await;
        }

        tracing::info!(
            agent = %self.agent_name,
            valid = enriched.len(),
            rejected,
            duration_ms = cycle_start.elapsed().as_millis(),
            "cycle complete"
        );
    }

    /// Run setup, install signal handlers, and loop until SIGTERM/SIGINT.
    /// Takes `Arc<Self>` so a caller can share the same runtime with the
    /// health/metrics HTTP surface running alongside it.
    pub async fn run_forever(self: std::sync::Arc<Self>) -> Result<(), String> {
        tracing::info!(agent = %self.agent_name, device = %self.device_id, "starting agent");

        if let Err(e) = self.agent.setup().await {
            tracing::error!(agent = %self.agent_name, %e, "setup failed; exiting");
            return Err(e);
        }

        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .map_err(|e| e.to_string())?;

        loop {
            if self.circuit_breaker.state() != amoskys_breaker::State::Open {
                let drained = self.drain_local_queue(200);
                if drained > 0 {
                    tracing::info!(agent = %self.agent_name, drained, "drained local queue");
                }
            }
            self.run_one_cycle().await;

            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = sigterm.recv() => break,
                _ = tokio::time::sleep(self.collection_interval) => {}
            }
        }

        tracing::info!(agent = %self.agent_name, "shutting down");
        self.agent.shutdown().await;
        tracing::info!(agent = %self.agent_name, "stopped");
        Ok(())
    }
}

//! AMOSKYS Breaker
//!
//! Circuit breaker (C4) guarding an agent's publish path against a bus that
//! is down or failing repeatedly. A CLOSED/OPEN/HALF_OPEN state machine
//! tracking pass/fail of a single call path rather than a table of
//! per-circuit session state.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// CLOSED: calls flow normally. OPEN: calls are rejected outright. HALF_OPEN:
/// a limited number of calls are allowed through to probe recovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

/// Raised by [`CircuitBreaker::allow_call`] when the circuit is OPEN.
#[derive(Clone, Copy, Debug, thiserror::Error)]
#[error("circuit breaker is open")]
pub struct CircuitOpen;

struct Inner {
    state: State,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

/// Protects a flaky downstream call (the bus `Publish` RPC) from being
/// hammered once it starts failing, and probes for recovery after a cooldown.
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    half_open_attempts: u32,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration, half_open_attempts: u32) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            half_open_attempts,
            inner: Mutex::new(Inner {
                state: State::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Defaults matching the hardened agent runtime's original tuning:
    /// 5 failures to open, 30s cooldown, 3 successes to fully close.
    pub fn with_defaults() -> Self {
        Self::new(5, Duration::from_secs(30), 3)
    }

    pub fn state(&self) -> State {
        self.inner.lock().state
    }

    /// Check whether a call may proceed. An OPEN circuit past its recovery
    /// timeout transitions to HALF_OPEN as a side effect before answering.
    pub fn allow_call(&self) -> Result<(), CircuitOpen> {
        let mut inner = self.inner.lock();
        if inner.state == State::Open {
            self.maybe_transition_half_open(&mut inner);
        }
        if inner.state == State::Open {
            return Err(CircuitOpen);
        }
        Ok(())
    }

    fn maybe_transition_half_open(&self, inner: &mut Inner) {
        let Some(last_failure) = inner.last_failure else {
            return;
        };
        if last_failure.elapsed() >= self.recovery_timeout {
            inner.state = State::HalfOpen;
            inner.failure_count = 0;
            inner.success_count = 0;
            tracing::info!("circuit breaker HALF_OPEN (testing recovery)");
        }
    }

    /// Record a successful call. In HALF_OPEN, enough consecutive successes
    /// fully close the circuit; in CLOSED it just resets the failure streak.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Open | State::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.half_open_attempts {
                    inner.state = State::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    tracing::info!("circuit breaker CLOSED (recovered)");
                }
            }
            State::Closed => {
                inner.failure_count = 0;
            }
        }
    }

    /// Record a failed call. Crossing `failure_threshold` opens the circuit,
    /// from any prior state.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());
        inner.success_count = 0;
        if inner.failure_count >= self.failure_threshold {
            if inner.state != State::Open {
                tracing::warn!(failures = inner.failure_count, "circuit breaker OPEN");
            }
            inner.state = State::Open;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(30), 2);
        assert_eq!(cb.state(), State::Closed);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), State::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), State::Open);

        assert!(cb.allow_call().is_err());
    }

    #[test]
    fn half_open_requires_recovery_timeout() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(20), 1);
        cb.record_failure();
        assert_eq!(cb.state(), State::Open);
        assert!(cb.allow_call().is_err());

        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.allow_call().is_ok());
        assert_eq!(cb.state(), State::HalfOpen);
    }

    #[test]
    fn half_open_closes_after_enough_successes() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(1), 2);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        cb.allow_call().unwrap();
        assert_eq!(cb.state(), State::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), State::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), State::Closed);
    }

    #[test]
    fn half_open_failure_reopens_circuit() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(1), 2);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        cb.allow_call().unwrap();
        assert_eq!(cb.state(), State::HalfOpen);

        cb.record_failure();
        assert_eq!(cb.state(), State::Open);
    }

    #[test]
    fn closed_state_resets_failure_count_on_success() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(30), 2);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), State::Closed);
    }
}

//! Circuit breaker guarding a single remote provider.
//!
//! After `failure_threshold` consecutive failures the breaker opens and
//! rejects calls until `reset_timeout_ms` has passed; the next call is
//! then let through as a trial call (half-open). While it is in flight
//! every other call is rejected. If the trial succeeds the breaker closes,
//! if it fails the breaker opens again. A trial that reports neither within
//! `reset_timeout_ms` (its caller was cancelled) no longer blocks a new one.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Milliseconds to wait in the open state before probing again.
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout_ms = timeout.as_millis() as u64;
        self
    }

    fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_started: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_started: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a call may proceed. Moves Open to HalfOpen once the reset
    /// timeout elapsed and admits a single trial call there.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.lock();
        let reset = self.config.reset_timeout();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                let trial_pending = inner
                    .trial_started
                    .is_some_and(|at| at.elapsed() < reset);
                if trial_pending {
                    return false;
                }
                inner.trial_started = Some(Instant::now());
                true
            }
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed() >= reset)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_started = Some(Instant::now());
                    tracing::debug!(provider = %self.name, "circuit half-open, trial call");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            tracing::info!(provider = %self.name, "circuit closed after successful trial call");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_started = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.trial_started = None;
        let should_open = match inner.state {
            CircuitState::Closed => inner.consecutive_failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };
        if should_open {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            tracing::warn!(
                provider = %self.name,
                failures = inner.consecutive_failures,
                "circuit opened"
            );
        }
    }

    pub fn current_state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let cb = CircuitBreaker::new("p", CircuitBreakerConfig::default());
        assert_eq!(cb.current_state(), CircuitState::Closed);
        assert!(cb.allow_request());
    }

    #[test]
    fn opens_after_threshold() {
        let cfg = CircuitBreakerConfig::default().with_failure_threshold(3);
        let cb = CircuitBreaker::new("p", cfg);
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.current_state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn success_resets_failure_streak() {
        let cfg = CircuitBreakerConfig::default().with_failure_threshold(3);
        let cb = CircuitBreaker::new("p", cfg);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.current_state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.current_state(), CircuitState::Open);
    }

    #[test]
    fn half_open_trial_outcomes() {
        let cfg = CircuitBreakerConfig::default()
            .with_failure_threshold(1)
            .with_reset_timeout(Duration::ZERO);
        let cb = CircuitBreaker::new("p", cfg);

        cb.record_failure();
        assert_eq!(cb.current_state(), CircuitState::Open);
        assert!(cb.allow_request());
        assert_eq!(cb.current_state(), CircuitState::HalfOpen);

        cb.record_failure();
        assert_eq!(cb.current_state(), CircuitState::Open);

        assert!(cb.allow_request());
        cb.record_success();
        assert_eq!(cb.current_state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_admits_one_trial_call_at_a_time() {
        let cfg = CircuitBreakerConfig::default()
            .with_failure_threshold(1)
            .with_reset_timeout(Duration::from_millis(30));
        let cb = CircuitBreaker::new("p", cfg);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(40));

        assert!(cb.allow_request());
        assert_eq!(cb.current_state(), CircuitState::HalfOpen);
        for _ in 0..5 {
            assert!(!cb.allow_request());
        }

        cb.record_success();
        assert!(cb.allow_request());
        assert!(cb.allow_request());
    }

    #[test]
    fn abandoned_trial_call_stops_blocking_after_reset_timeout() {
        let cfg = CircuitBreakerConfig::default()
            .with_failure_threshold(1)
            .with_reset_timeout(Duration::from_millis(30));
        let cb = CircuitBreaker::new("p", cfg);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(40));

        assert!(cb.allow_request());
        assert!(!cb.allow_request());
        std::thread::sleep(Duration::from_millis(40));
        assert!(cb.allow_request());
        assert_eq!(cb.current_state(), CircuitState::HalfOpen);
    }
}

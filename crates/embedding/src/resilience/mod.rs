//! Retry and circuit breaking for remote embedding calls.

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use retry::{execute_with_retry, RetryConfig, RetryOutcome};

//! Resilience policies wrapped around upstream calls.
//!
//! The retry policy wraps the raw call; the circuit breaker wraps the whole
//! retrying unit. That ordering matters: the breaker records one failure per
//! exhausted retry sequence rather than one per attempt, so a transient blip
//! that recovers on retry never moves the breaker.

mod breaker;
mod guarded;
mod retry;

pub use breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use guarded::GuardedCall;
pub use retry::RetryPolicy;

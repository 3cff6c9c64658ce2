use crate::error::GatewayError;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Normal operation, calls pass through.
    Closed,
    /// Failing fast, calls are rejected without consulting upstream.
    Open,
    /// Probing: exactly one call is allowed through to test recovery.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker open.
    pub failure_threshold: u32,
    /// How long an open breaker waits before admitting a probe.
    pub timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(60),
        }
    }
}

struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Point-in-time view of a breaker, for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    /// Time since the most recent recorded failure, if any.
    pub last_failure_age: Option<Duration>,
}

/// Per-upstream-service fail-fast state machine.
///
/// Transitions are exactly: Closed→Open once consecutive failures reach the
/// threshold, Open→HalfOpen once the timeout elapses (auto-promoted on the
/// next call, which becomes the single probe), HalfOpen→Closed on probe
/// success, HalfOpen→Open on probe failure. The failure count resets only on
/// a success while Closed or on the HalfOpen→Closed transition.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_age: inner.last_failure_at.map(|at| at.elapsed()),
        }
    }

    /// Execute `call` under the breaker.
    ///
    /// Fails fast with [`GatewayError::CircuitOpen`] while the breaker is
    /// open and the timeout has not elapsed; `call` is not invoked in that
    /// case. An open breaker past its timeout auto-promotes to half-open and
    /// admits exactly one probe.
    pub async fn wrap<T, F, Fut>(&self, call: F) -> Result<T, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        self.try_acquire()?;
        match call().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    fn try_acquire(&self) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let timeout_elapsed = inner
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.config.timeout);
                if timeout_elapsed {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    info!(breaker = %self.name, "circuit breaker half-open, admitting probe");
                    Ok(())
                } else {
                    Err(GatewayError::CircuitOpen {
                        service: self.name.clone(),
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(GatewayError::CircuitOpen {
                        service: self.name.clone(),
                    })
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                inner.probe_in_flight = false;
                info!(breaker = %self.name, "circuit breaker recovered, closing");
            }
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.last_failure_at = Some(Instant::now());
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    error!(
                        breaker = %self.name,
                        failures = inner.failure_count,
                        "circuit breaker tripped open"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.probe_in_flight = false;
                warn!(breaker = %self.name, "probe failed, circuit breaker re-opened");
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn breaker(threshold: u32, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            BreakerConfig {
                failure_threshold: threshold,
                timeout,
            },
        )
    }

    async fn failing_call(breaker: &CircuitBreaker, calls: &Arc<AtomicUsize>) {
        let calls = Arc::clone(calls);
        let _ = breaker
            .wrap(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(GatewayError::Upstream(crate::error::ServiceError::server(
                    "boom",
                )))
            })
            .await;
    }

    #[tokio::test]
    async fn starts_closed_and_passes_calls() {
        let breaker = breaker(3, Duration::from_secs(60));
        assert_eq!(breaker.state(), CircuitState::Closed);

        let result = breaker.wrap(|| async { Ok::<_, GatewayError>(1) }).await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn trips_open_at_threshold_and_fails_fast() {
        let breaker = breaker(3, Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            failing_call(&breaker, &calls).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Fail fast: the wrapped call must not run
        let rejected = breaker
            .wrap(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, GatewayError>(())
            })
            .await;
        assert!(matches!(rejected, Err(GatewayError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn half_open_probe_success_closes_breaker() {
        let breaker = breaker(2, Duration::from_millis(20));
        let calls = Arc::new(AtomicUsize::new(0));

        failing_call(&breaker, &calls).await;
        failing_call(&breaker, &calls).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        thread::sleep(Duration::from_millis(40));

        let result = breaker.wrap(|| async { Ok::<_, GatewayError>(7) }).await;
        assert_eq!(result.unwrap(), 7);

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
    }

    #[tokio::test]
    async fn half_open_probe_failure_reopens_breaker() {
        let breaker = breaker(1, Duration::from_millis(20));
        let calls = Arc::new(AtomicUsize::new(0));

        failing_call(&breaker, &calls).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        thread::sleep(Duration::from_millis(40));
        failing_call(&breaker, &calls).await;
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn only_one_probe_admitted_while_half_open() {
        let breaker = Arc::new(breaker(1, Duration::from_millis(10)));
        let calls = Arc::new(AtomicUsize::new(0));

        failing_call(&breaker, &calls).await;
        thread::sleep(Duration::from_millis(30));

        // First caller becomes the probe and holds the slot
        let probe = {
            let breaker = Arc::clone(&breaker);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                breaker
                    .wrap(move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, GatewayError>(())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // While the probe is in flight, other calls fail fast
        let rejected = breaker.wrap(|| async { Ok::<_, GatewayError>(()) }).await;
        assert!(matches!(rejected, Err(GatewayError::CircuitOpen { .. })));

        probe.await.unwrap().unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn success_resets_failure_count_while_closed() {
        let breaker = breaker(3, Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        failing_call(&breaker, &calls).await;
        failing_call(&breaker, &calls).await;
        assert_eq!(breaker.snapshot().failure_count, 2);

        let _ = breaker.wrap(|| async { Ok::<_, GatewayError>(()) }).await;
        assert_eq!(breaker.snapshot().failure_count, 0);

        // The earlier failures no longer count toward the threshold
        failing_call(&breaker, &calls).await;
        failing_call(&breaker, &calls).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}

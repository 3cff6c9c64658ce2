use crate::error::GatewayError;
use rand::RngExt;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Exponential backoff with jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Randomize each delay to 50-100% of its nominal value so synchronized
    /// callers do not retry in lockstep.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following attempt number `attempt` (0-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let exp = attempt.min(32);
        let nominal_ms = base_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay.as_millis() as u64);

        if self.jitter {
            let factor: f64 = rand::rng().random_range(0.5..=1.0);
            Duration::from_millis((nominal_ms as f64 * factor) as u64)
        } else {
            Duration::from_millis(nominal_ms)
        }
    }

    /// Invoke `call` until it succeeds, exhausts `max_attempts`, or fails
    /// with a non-retryable classification.
    ///
    /// Auth and config errors are re-raised immediately; everything else is
    /// retried with exponential backoff. The last error is returned once the
    /// attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, mut call: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !err.is_retryable() {
                        warn!(%err, "non-retryable error, giving up immediately");
                        return Err(err);
                    }

                    if attempt + 1 < self.max_attempts {
                        let delay = self.backoff_delay(attempt);
                        warn!(
                            attempt = attempt + 1,
                            max_attempts = self.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            %err,
                            "attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            GatewayError::Config("retry policy allows zero attempts".to_string())
        }))
    }
}

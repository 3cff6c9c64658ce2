//! Fixed-window admission control per user.
//!
//! The window does not slide: a user who bursts at the end of one window and
//! the start of the next can briefly exceed the nominal rate. That is an
//! accepted approximation. The limiter fails open — if its own bookkeeping
//! ever errors, the request is allowed and the incident is logged loudly,
//! because availability beats strict enforcement here.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    window_start: Instant,
    count: u32,
}

/// Detailed admission state for one user, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateStatus {
    pub count: u32,
    pub remaining: u32,
    pub resets_in: Duration,
    pub window_expired: bool,
}

/// Fixed-window rate limiter keyed by user id.
///
/// The outer lock guards only window lookup/creation; each user's counter
/// sits behind its own mutex so admission checks for independent users never
/// contend.
pub struct RateLimiter {
    windows: RwLock<HashMap<u64, Arc<Mutex<RateWindow>>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
        }
    }

    fn window(&self, user: u64) -> Arc<Mutex<RateWindow>> {
        if let Some(window) = self.windows.read().get(&user) {
            return Arc::clone(window);
        }
        let mut windows = self.windows.write();
        Arc::clone(windows.entry(user).or_insert_with(|| {
            Arc::new(Mutex::new(RateWindow {
                window_start: Instant::now(),
                count: 0,
            }))
        }))
    }

    /// Admit or deny one request from `user`.
    ///
    /// Returns `true` when the request is within limits. Any internal
    /// bookkeeping failure also returns `true` (fail-open) after logging at
    /// high severity.
    pub fn check(&self, user: u64, limit: u32, window_length: Duration) -> bool {
        match self.try_check(user, limit, window_length) {
            Ok(allowed) => allowed,
            Err(reason) => {
                error!(user, reason, "rate limiter bookkeeping failed; failing open");
                true
            }
        }
    }

    fn try_check(
        &self,
        user: u64,
        limit: u32,
        window_length: Duration,
    ) -> Result<bool, &'static str> {
        let slot = self.window(user);
        let mut window = slot.lock();

        if window.window_start.elapsed() > window_length {
            window.window_start = Instant::now();
            window.count = 1;
            info!(user, limit, "rate limit window reset");
            return Ok(true);
        }

        let next = window
            .count
            .checked_add(1)
            .ok_or("admission counter overflow")?;
        if next <= limit {
            window.count = next;
            debug!(user, count = window.count, limit, "rate limit check passed");
            return Ok(true);
        }

        warn!(
            user,
            count = window.count,
            limit,
            resets_in_secs = (window_length.saturating_sub(window.window_start.elapsed())).as_secs(),
            "rate limit exceeded"
        );
        Ok(false)
    }

    /// Snapshot the admission state for `user` without consuming a slot.
    pub fn status(&self, user: u64, limit: u32, window_length: Duration) -> RateStatus {
        let slot = self.window(user);
        let window = slot.lock();
        let elapsed = window.window_start.elapsed();

        if elapsed > window_length {
            return RateStatus {
                count: 0,
                remaining: limit,
                resets_in: Duration::ZERO,
                window_expired: true,
            };
        }

        RateStatus {
            count: window.count,
            remaining: limit.saturating_sub(window.count),
            resets_in: window_length.saturating_sub(elapsed),
            window_expired: false,
        }
    }

    #[cfg(test)]
    fn seed_window(&self, user: u64, count: u32, window_start: Instant) {
        let slot = self.window(user);
        let mut window = slot.lock();
        window.count = count;
        window.window_start = window_start;
    }
}

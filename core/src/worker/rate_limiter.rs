//! Fixed-interval rate limiting for request dispatch

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Throttle enforcing a minimum interval between granted dispatches
///
/// One instance is shared via `Arc` by every worker bound to it. The
/// elapsed-time check and the timestamp update happen under one lock, so
/// callers are admitted one at a time in lock order.
pub struct RateLimiter {
    interval: Duration,
    max_rps: f64,
    last_granted: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `max_rps` - Maximum requests per second. Values below 1 (and NaN)
    ///   are raised to 1 RPS.
    ///
    /// # Examples
    /// ```
    /// use requester_core::worker::RateLimiter;
    /// use std::time::Duration;
    ///
    /// let limiter = RateLimiter::new(100.0);
    /// assert_eq!(limiter.interval(), Duration::from_millis(10));
    /// ```
    pub fn new(max_rps: f64) -> Self {
        let rps = max_rps.max(1.0);
        Self {
            interval: Duration::from_secs_f64(1.0 / rps),
            max_rps: rps,
            last_granted: Mutex::new(None),
        }
    }

    /// Wait until a dispatch is allowed, then record it
    ///
    /// The first acquisition is granted immediately.
    pub async fn acquire(&self) {
        let mut last = self.last_granted.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Minimum interval between granted dispatches
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Effective requests per second after flooring
    pub fn max_rps(&self) -> f64 {
        self.max_rps
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_rps", &self.max_rps)
            .field("interval", &self.interval)
            .finish()
    }
}

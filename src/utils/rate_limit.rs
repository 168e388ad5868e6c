//! Minimum-interval request gate shared across concurrent runs.
//!
//! One instance is created per process and injected into every session
//! client targeting the remote source, so the pool-wide rate budget holds no
//! matter how many runs execute concurrently.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{self, Instant};

/// Enforces a minimum spacing between grants. `acquire` suspends the caller
/// until at least the configured interval has elapsed since the previous
/// grant. The tokio mutex queues waiters fairly, so grants are issued in
/// request order.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_grant: Mutex::new(None),
        }
    }

    /// Wait for the next grant. Never fails; it only delays.
    pub async fn acquire(&self) {
        let mut last = self.last_grant.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

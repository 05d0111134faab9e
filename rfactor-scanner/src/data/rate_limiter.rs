//! Call pacing for provider requests.
//!
//! Enforces a minimum interval between consecutive provider calls. Slots are
//! reserved under a lock, so concurrent workers sharing one limiter never
//! exceed one call per interval in aggregate.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// A minimum-interval rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum spacing between two calls
    min_interval: Duration,
    /// Earliest instant the next call may start
    next_slot: Mutex<Option<Instant>>,
    /// Name for logging
    name: String,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// # Arguments
    /// * `name` - Name for logging purposes
    /// * `min_interval` - Minimum spacing between consecutive calls
    pub fn new(name: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
            name: name.into(),
        }
    }

    /// Create a rate limiter from a delay in milliseconds.
    pub fn from_millis(name: impl Into<String>, delay_ms: u64) -> Self {
        Self::new(name, Duration::from_millis(delay_ms))
    }

    /// Minimum spacing between calls.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for the next free slot.
    ///
    /// The first call returns immediately; each later call starts at least
    /// `min_interval` after the previous one.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let wait = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(slot + self.min_interval);
            slot.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            debug!(
                limiter = %self.name,
                wait_ms = wait.as_millis() as u64,
                "Pacing provider call"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

/// Thread-safe shared rate limiter.
pub type SharedRateLimiter = Arc<RateLimiter>;

/// Create a shared rate limiter.
pub fn shared_limiter(name: impl Into<String>, delay_ms: u64) -> SharedRateLimiter {
    Arc::new(RateLimiter::from_millis(name, delay_ms))
}

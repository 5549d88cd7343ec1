//! Retry policy: decides how a lock acquisition is retried and how much of
//! the TTL is trusted.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

use super::lock::offset;
use crate::config::LockSettings;

/// Fixed margin added to the drift allowance, on top of `ttl * drift_factor`.
const DRIFT_FLOOR: Duration = Duration::from_millis(2);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum acquisition attempts, the first one included.
    pub attempts: u32,

    /// Base wait between two attempts.
    pub delay: Duration,

    /// Upper bound of the random extra wait.
    pub jitter: Duration,

    pub drift_factor: f64,
}

impl RetryPolicy {
    pub fn from_settings(settings: &LockSettings) -> Self {
        Self {
            attempts: settings.retry_count.max(1),
            delay: settings.retry_delay(),
            jitter: settings.retry_jitter(),
            drift_factor: settings.drift_factor,
        }
    }

    /// Wait before the next attempt: `delay + uniform(0..=jitter)`.
    ///
    /// The jitter spreads contending callers apart so they do not retry in
    /// lockstep.
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = if jitter_ms == 0 {
            0
        } else {
            rng.gen_range(0..=jitter_ms)
        };
        self.delay + Duration::from_millis(extra)
    }

    /// Clock-drift allowance for a lock of `ttl`: `round(ttl * factor) + 2ms`.
    pub fn drift(&self, ttl: Duration) -> Duration {
        let scaled = (ttl.as_millis() as f64 * self.drift_factor).round();
        Duration::from_millis(scaled as u64) + DRIFT_FLOOR
    }

    /// Deadline the holder may rely on for a lock requested at `started`.
    ///
    /// Returns `None` when the drift allowance swallows the whole TTL.
    pub fn valid_until(&self, started: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
        let trusted = ttl.checked_sub(self.drift(ttl))?;
        if trusted.is_zero() {
            return None;
        }
        Some(offset(started, trusted))
    }
}

impl From<&LockSettings> for RetryPolicy {
    fn from(settings: &LockSettings) -> Self {
        Self::from_settings(settings)
    }
}

//! Lock and batch settings.
//!
//! Durations are carried as milliseconds so the settings deserialize from
//! plain JSON/env values; accessors hand out `Duration`s.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("drift_factor must be within [0, 1), got {0}")]
    InvalidDriftFactor(f64),

    #[error("retry_count must be at least 1")]
    ZeroRetryCount,

    #[error("lock ttl must be greater than zero")]
    ZeroTtl,

    #[error("lock resource name must not be empty")]
    EmptyResource,

    #[error("automatic_extension_threshold ({threshold_ms}ms) must be below the lock ttl ({ttl_ms}ms)")]
    ThresholdNotBelowTtl { threshold_ms: u64, ttl_ms: u64 },
}

/// Settings handed to a lock manager.
///
/// Defaults follow the values the update demo has always shipped with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// Fraction of the TTL reserved as clock-drift margin.
    pub drift_factor: f64,

    /// Maximum number of acquisition attempts (the first one included).
    pub retry_count: u32,

    /// Base wait between attempts.
    pub retry_delay_ms: u64,

    /// Upper bound of the random wait added to `retry_delay_ms`.
    pub retry_jitter_ms: u64,

    /// Remaining validity below which a held lock is extended.
    pub automatic_extension_threshold_ms: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            drift_factor: 0.01,
            retry_count: 10,
            retry_delay_ms: 100,
            retry_jitter_ms: 200,
            automatic_extension_threshold_ms: 500,
        }
    }
}

impl LockSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn retry_jitter(&self) -> Duration {
        Duration::from_millis(self.retry_jitter_ms)
    }

    pub fn automatic_extension_threshold(&self) -> Duration {
        Duration::from_millis(self.automatic_extension_threshold_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.drift_factor) {
            return Err(ConfigError::InvalidDriftFactor(self.drift_factor));
        }
        if self.retry_count == 0 {
            return Err(ConfigError::ZeroRetryCount);
        }
        Ok(())
    }
}

/// How update tasks are coordinated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    /// Every critical section runs under the lock.
    #[default]
    Exclusive,

    /// No lock at all. Loses updates under contention; kept only as the
    /// baseline the exclusive mode is compared against.
    Unsynchronized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Lock resource guarding the document.
    pub resource: String,

    /// Lock TTL requested per acquisition.
    pub ttl_ms: u64,

    pub isolation: Isolation,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            resource: "a".to_string(),
            ttl_ms: 5000,
            isolation: Isolation::Exclusive,
        }
    }
}

impl BatchSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Checks the batch against the lock settings it will run with.
    pub fn validate(&self, lock: &LockSettings) -> Result<(), ConfigError> {
        if self.isolation == Isolation::Unsynchronized {
            return Ok(());
        }
        if self.resource.trim().is_empty() {
            return Err(ConfigError::EmptyResource);
        }
        if self.ttl_ms == 0 {
            return Err(ConfigError::ZeroTtl);
        }
        if lock.automatic_extension_threshold_ms >= self.ttl_ms {
            return Err(ConfigError::ThresholdNotBelowTtl {
                threshold_ms: lock.automatic_extension_threshold_ms,
                ttl_ms: self.ttl_ms,
            });
        }
        lock.validate()
    }
}

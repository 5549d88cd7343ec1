//! A held lock as seen by its holder.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::ids::LockToken;

/// Ownership of a set of lock resources until `valid_until`.
///
/// `valid_until` is the holder's conservative view: TTL minus the drift
/// margin, measured from the moment the acquisition attempt started. The
/// lock service keeps the entry a little longer than that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    resources: Vec<String>,
    token: LockToken,
    acquired_at: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    attempts: u32,
}

impl Lock {
    pub fn new(
        resources: Vec<String>,
        token: LockToken,
        acquired_at: DateTime<Utc>,
        valid_until: DateTime<Utc>,
        attempts: u32,
    ) -> Self {
        Self {
            resources,
            token,
            acquired_at,
            valid_until,
            attempts,
        }
    }

    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    pub fn token(&self) -> LockToken {
        self.token
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn valid_until(&self) -> DateTime<Utc> {
        self.valid_until
    }

    /// Attempts it took to acquire (1 = first try).
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.valid_until
    }

    /// Remaining validity, or zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.valid_until - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Same ownership with a new deadline (after an extension).
    pub fn renewed(&self, valid_until: DateTime<Utc>) -> Self {
        Self {
            valid_until,
            ..self.clone()
        }
    }
}

/// `at + d`, saturating at the largest representable instant.
pub(crate) fn offset(at: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|d| at.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

//! Acquisition loop shared by the lock managers.
//!
//! A backend only knows how to try once (`attempt`) and how to undo a
//! successful try (`unlock`). Retrying, jitter and the drift check live here.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::config::LockSettings;
use crate::domain::{Lock, LockError, LockToken, RetryPolicy};
use crate::ports::Clock;

#[async_trait]
pub(crate) trait AttemptLock: Send + Sync {
    /// Takes every resource for `token`, or none of them.
    async fn attempt(
        &self,
        resources: &[String],
        token: LockToken,
        ttl: Duration,
    ) -> Result<bool, LockError>;

    /// Deletes the entries still owned by `token`; returns how many.
    async fn unlock(&self, resources: &[String], token: LockToken) -> Result<usize, LockError>;
}

pub(crate) async fn acquire_with_retry<A>(
    backend: &A,
    clock: &dyn Clock,
    settings: &LockSettings,
    resources: &[String],
    ttl: Duration,
) -> Result<Lock, LockError>
where
    A: AttemptLock + ?Sized,
{
    if resources.is_empty() {
        return Err(LockError::InvalidRequest("no resources given".into()));
    }
    if ttl.is_zero() {
        return Err(LockError::InvalidRequest("ttl must be greater than zero".into()));
    }

    let policy = RetryPolicy::from_settings(settings);
    let token = LockToken::generate();

    for attempt in 1..=policy.attempts {
        let started = clock.now();
        match backend.attempt(resources, token, ttl).await {
            Ok(true) => {
                // elapsed time counts against the TTL
                if let Some(valid_until) = policy.valid_until(started, ttl)
                    && clock.now() < valid_until
                {
                    trace!(%token, attempt, "lock acquired");
                    return Ok(Lock::new(
                        resources.to_vec(),
                        token,
                        started,
                        valid_until,
                        attempt,
                    ));
                }
                debug!(%token, attempt, "lock acquired too late to use, undoing");
                if let Err(err) = backend.unlock(resources, token).await {
                    debug!(%token, error = %err, "undo failed; entry will expire");
                }
            }
            Ok(false) => trace!(attempt, ?resources, "lock busy"),
            Err(err) => debug!(attempt, error = %err, "lock attempt errored"),
        }

        if attempt < policy.attempts {
            let delay = policy.next_delay(&mut rand::thread_rng());
            tokio::time::sleep(delay).await;
        }
    }

    Err(LockError::AcquisitionFailed {
        resources: resources.to_vec(),
        attempts: policy.attempts,
    })
}

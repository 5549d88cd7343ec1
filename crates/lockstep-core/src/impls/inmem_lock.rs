//! InMemoryLockManager - 開発用・テスト用のロック
//!
//! # 実装詳細
//! - HashMap<resource, Held> をトークン表として tokio::sync::Mutex で守る
//! - 期限は Clock で判定する（ManualClock で期限切れを再現できる）
//! - 各呼び出しの先頭で yield し、ネットワーク往復のサスペンドを模倣する

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::acquire::{AttemptLock, acquire_with_retry};
use crate::config::LockSettings;
use crate::domain::lock::offset;
use crate::domain::{Lock, LockError, LockToken, RetryPolicy};
use crate::ports::{Clock, LockManager};

#[derive(Debug, Clone, Copy)]
struct Held {
    token: LockToken,
    expires_at: DateTime<Utc>,
}

pub struct InMemoryLockManager {
    entries: Mutex<HashMap<String, Held>>,
    settings: LockSettings,
    clock: Arc<dyn Clock>,
}

impl InMemoryLockManager {
    pub fn new(settings: LockSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            settings,
            clock,
        }
    }

    /// Is `resource` held by anyone right now?
    pub async fn is_locked(&self, resource: &str) -> bool {
        let now = self.clock.now();
        self.entries
            .lock()
            .await
            .get(resource)
            .is_some_and(|held| held.expires_at > now)
    }
}

#[async_trait]
impl AttemptLock for InMemoryLockManager {
    async fn attempt(
        &self,
        resources: &[String],
        token: LockToken,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        tokio::task::yield_now().await;

        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let busy = resources.iter().any(|resource| {
            entries
                .get(resource)
                .is_some_and(|held| held.token != token && held.expires_at > now)
        });
        if busy {
            return Ok(false);
        }

        let expires_at = offset(now, ttl);
        for resource in resources {
            entries.insert(resource.clone(), Held { token, expires_at });
        }
        Ok(true)
    }

    async fn unlock(&self, resources: &[String], token: LockToken) -> Result<usize, LockError> {
        tokio::task::yield_now().await;

        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let mut removed = 0;
        for resource in resources {
            if let Some(held) = entries.get(resource).copied()
                && held.token == token
            {
                entries.remove(resource);
                // an expired entry is already gone as far as other clients can tell
                if held.expires_at > now {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    fn settings(&self) -> &LockSettings {
        &self.settings
    }

    async fn acquire(&self, resources: &[String], ttl: Duration) -> Result<Lock, LockError> {
        acquire_with_retry(self, self.clock.as_ref(), &self.settings, resources, ttl).await
    }

    async fn release(&self, lock: &Lock) -> Result<(), LockError> {
        let removed = self.unlock(lock.resources(), lock.token()).await?;
        if removed == 0 {
            return Err(LockError::NotHeld {
                resources: lock.resources().to_vec(),
                token: lock.token(),
            });
        }
        Ok(())
    }

    async fn extend(&self, lock: &Lock, ttl: Duration) -> Result<Lock, LockError> {
        tokio::task::yield_now().await;

        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let owned = lock.resources().iter().all(|resource| {
            entries
                .get(resource)
                .is_some_and(|held| held.token == lock.token() && held.expires_at > now)
        });
        if !owned {
            return Err(LockError::NotHeld {
                resources: lock.resources().to_vec(),
                token: lock.token(),
            });
        }

        let expires_at = offset(now, ttl);
        for resource in lock.resources() {
            if let Some(held) = entries.get_mut(resource) {
                held.expires_at = expires_at;
            }
        }

        let valid_until = RetryPolicy::from_settings(&self.settings)
            .valid_until(now, ttl)
            .unwrap_or(now);
        Ok(lock.renewed(valid_until))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ManualClock;
    use chrono::TimeZone;

    fn resources() -> Vec<String> {
        vec!["a".to_string()]
    }

    fn manager(retry_count: u32) -> (InMemoryLockManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let settings = LockSettings {
            retry_count,
            retry_delay_ms: 10,
            retry_jitter_ms: 0,
            ..LockSettings::default()
        };
        (InMemoryLockManager::new(settings, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let (locks, _) = manager(1);
        let lock = locks
            .acquire(&resources(), Duration::from_secs(5))
            .await
            .expect("acquire");
        assert_eq!(lock.attempts(), 1);
        assert!(locks.is_locked("a").await);

        locks.release(&lock).await.expect("release");
        assert!(!locks.is_locked("a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_prevents_second_acquisition() {
        let (locks, _) = manager(3);
        let _held = locks
            .acquire(&resources(), Duration::from_secs(5))
            .await
            .expect("acquire1");

        let err = locks
            .acquire(&resources(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LockError::AcquisitionFailed {
                resources: resources(),
                attempts: 3
            }
        );
    }

    #[tokio::test]
    async fn test_expired_lock_can_be_taken_over() {
        let (locks, clock) = manager(1);
        let first = locks
            .acquire(&resources(), Duration::from_millis(100))
            .await
            .expect("acquire1");

        clock.advance(Duration::from_millis(150));

        let second = locks
            .acquire(&resources(), Duration::from_secs(5))
            .await
            .expect("acquire2");
        assert_ne!(first.token(), second.token());

        // the stale holder must not delete its successor's entry
        let err = locks.release(&first).await.unwrap_err();
        assert!(matches!(err, LockError::NotHeld { .. }));
        assert!(locks.is_locked("a").await);
    }

    #[tokio::test]
    async fn test_extend_pushes_deadline() {
        let (locks, clock) = manager(1);
        let lock = locks
            .acquire(&resources(), Duration::from_millis(1000))
            .await
            .expect("acquire");

        clock.advance(Duration::from_millis(800));
        let renewed = locks
            .extend(&lock, Duration::from_millis(1000))
            .await
            .expect("extend");
        assert!(renewed.valid_until() > lock.valid_until());

        // past the original deadline, still held
        clock.advance(Duration::from_millis(500));
        assert!(locks.is_locked("a").await);
        assert!(renewed.is_valid_at(clock.now()));
    }

    #[tokio::test]
    async fn test_extend_after_expiry_fails() {
        let (locks, clock) = manager(1);
        let lock = locks
            .acquire(&resources(), Duration::from_millis(100))
            .await
            .expect("acquire");
        clock.advance(Duration::from_millis(200));

        let err = locks
            .extend(&lock, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::NotHeld { .. }));
    }

    #[tokio::test]
    async fn test_multi_resource_is_all_or_nothing() {
        let (locks, _) = manager(1);
        let _b = locks
            .acquire(&["b".to_string()], Duration::from_secs(5))
            .await
            .expect("acquire b");

        let both = vec!["a".to_string(), "b".to_string()];
        assert!(locks.acquire(&both, Duration::from_secs(5)).await.is_err());
        assert!(!locks.is_locked("a").await);
    }

    #[tokio::test]
    async fn test_rejects_empty_request() {
        let (locks, _) = manager(1);
        let err = locks.acquire(&[], Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, LockError::InvalidRequest(_)));

        let err = locks.acquire(&resources(), Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, LockError::InvalidRequest(_)));
    }
}

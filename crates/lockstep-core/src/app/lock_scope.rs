//! LockScope - ロックの取得から解放までを 1 つの値に閉じ込める
//!
//! # 学習ポイント
//! - RAII guard: 取得できたロックは、どの経路で抜けても 1 回だけ解放される
//! - `release()` を明示的に呼べば解放エラーを受け取れる。
//!   呼ばずに drop した場合は Drop でベストエフォートの解放を spawn する
//! - 自動延長: 残り有効期間が threshold を下回ったら裏のタスクが extend する

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::domain::{Lock, LockError};
use crate::ports::{Clock, LockManager};

/// Shortest wait between two extensions, so a threshold close to the TTL
/// cannot spin.
const MIN_RENEW_INTERVAL: Duration = Duration::from_millis(10);

/// A held lock, released exactly once.
///
/// # 使用例
/// ```ignore
/// let scope = LockScope::acquire(manager, clock, &["a".into()], ttl).await?;
/// // critical section
/// scope.release().await?;
/// ```
pub struct LockScope {
    manager: Arc<dyn LockManager>,
    clock: Arc<dyn Clock>,
    lock: Lock,
    renewal: Option<Renewal>,
    released: bool,
}

impl LockScope {
    /// Acquires `resources` for `ttl`.
    ///
    /// A non-zero `automatic_extension_threshold` in the manager's settings
    /// starts a renewal task for the lifetime of the scope.
    pub async fn acquire(
        manager: Arc<dyn LockManager>,
        clock: Arc<dyn Clock>,
        resources: &[String],
        ttl: Duration,
    ) -> Result<Self, LockError> {
        let lock = manager.acquire(resources, ttl).await?;

        let threshold = manager.settings().automatic_extension_threshold();
        let renewal = (!threshold.is_zero()).then(|| {
            Renewal::spawn(
                Arc::clone(&manager),
                Arc::clone(&clock),
                lock.clone(),
                ttl,
                threshold,
            )
        });

        Ok(Self {
            manager,
            clock,
            lock,
            renewal,
            released: false,
        })
    }

    pub fn lock(&self) -> &Lock {
        &self.lock
    }

    /// Current deadline, including any automatic extension.
    pub fn valid_until(&self) -> DateTime<Utc> {
        match &self.renewal {
            Some(renewal) => *renewal.deadline.borrow(),
            None => self.lock.valid_until(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.clock.now() < self.valid_until()
    }

    /// Stops renewal and releases the lock.
    ///
    /// # Errors
    ///
    /// Returns the manager's error if the lock was no longer held (it expired
    /// and was possibly taken by someone else) or the service was unreachable.
    pub async fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        if let Some(renewal) = self.renewal.take() {
            renewal.stop().await;
        }
        self.manager.release(&self.lock).await
    }
}

impl Drop for LockScope {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Some(renewal) = self.renewal.take() {
            renewal.join.abort();
        }

        // Best-effort async release in destructor
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(token = %self.lock.token(), "lock scope dropped outside a runtime; lock left to expire");
            return;
        };
        let manager = Arc::clone(&self.manager);
        let lock = self.lock.clone();
        runtime.spawn(async move {
            if let Err(err) = manager.release(&lock).await {
                warn!(token = %lock.token(), error = %err, "release on drop failed");
            }
        });
    }
}

struct Renewal {
    stop: watch::Sender<bool>,
    deadline: watch::Receiver<DateTime<Utc>>,
    join: JoinHandle<()>,
}

impl Renewal {
    fn spawn(
        manager: Arc<dyn LockManager>,
        clock: Arc<dyn Clock>,
        lock: Lock,
        ttl: Duration,
        threshold: Duration,
    ) -> Self {
        let (stop, stop_rx) = watch::channel(false);
        let (deadline_tx, deadline) = watch::channel(lock.valid_until());
        let join = tokio::spawn(renew_until_stopped(
            manager,
            clock,
            lock,
            ttl,
            threshold,
            stop_rx,
            deadline_tx,
        ));
        Self {
            stop,
            deadline,
            join,
        }
    }

    async fn stop(self) {
        // ignore send error: the renewal task may already have given up
        let _ = self.stop.send(true);
        let _ = self.join.await;
    }
}

async fn renew_until_stopped(
    manager: Arc<dyn LockManager>,
    clock: Arc<dyn Clock>,
    mut lock: Lock,
    ttl: Duration,
    threshold: Duration,
    mut stop: watch::Receiver<bool>,
    deadline: watch::Sender<DateTime<Utc>>,
) {
    loop {
        let wait = lock
            .remaining(clock.now())
            .saturating_sub(threshold)
            .max(MIN_RENEW_INTERVAL);

        tokio::select! {
            _ = stop.changed() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        match manager.extend(&lock, ttl).await {
            Ok(renewed) => {
                trace!(token = %renewed.token(), valid_until = %renewed.valid_until(), "lock extended");
                deadline.send_replace(renewed.valid_until());
                lock = renewed;
            }
            Err(err) => {
                warn!(token = %lock.token(), error = %err, "automatic extension failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockSettings;
    use crate::impls::InMemoryLockManager;
    use crate::ports::TokioClock;

    fn setup(threshold_ms: u64) -> (Arc<InMemoryLockManager>, Arc<dyn Clock>) {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new(Utc::now()));
        let settings = LockSettings {
            retry_count: 1,
            automatic_extension_threshold_ms: threshold_ms,
            ..LockSettings::default()
        };
        (
            Arc::new(InMemoryLockManager::new(settings, Arc::clone(&clock))),
            clock,
        )
    }

    fn resources() -> Vec<String> {
        vec!["a".to_string()]
    }

    #[tokio::test(start_paused = true)]
    async fn release_frees_the_resource() {
        let (locks, clock) = setup(0);
        let scope = LockScope::acquire(locks.clone(), clock, &resources(), Duration::from_secs(5))
            .await
            .expect("acquire");
        assert!(scope.is_valid());
        assert!(locks.is_locked("a").await);

        scope.release().await.expect("release");
        assert!(!locks.is_locked("a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_releases_in_background() {
        let (locks, clock) = setup(0);
        let scope = LockScope::acquire(locks.clone(), clock, &resources(), Duration::from_secs(5))
            .await
            .expect("acquire");
        drop(scope);

        // let the spawned release run
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!locks.is_locked("a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn without_extension_the_scope_expires() {
        let (locks, clock) = setup(0);
        let scope = LockScope::acquire(locks.clone(), clock, &resources(), Duration::from_secs(1))
            .await
            .expect("acquire");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!scope.is_valid());
        assert!(!locks.is_locked("a").await);

        let err = scope.release().await.unwrap_err();
        assert!(matches!(err, LockError::NotHeld { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn automatic_extension_keeps_lock_alive() {
        let (locks, clock) = setup(500);
        let scope = LockScope::acquire(locks.clone(), clock, &resources(), Duration::from_secs(1))
            .await
            .expect("acquire");
        let first_deadline = scope.valid_until();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(scope.is_valid());
        assert!(scope.valid_until() > first_deadline);
        assert!(locks.is_locked("a").await);

        scope.release().await.expect("release");
        assert!(!locks.is_locked("a").await);
    }
}

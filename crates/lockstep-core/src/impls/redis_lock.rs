//! RedisLockManager - 単一ノードの Redis ロック
//!
//! # 仕組み
//! 1. acquire: Lua で「全キーが存在しなければ SET token PX ttl」を原子的に実行
//! 2. release: Lua で「値が token と一致するキーだけ DEL」
//! 3. extend: Lua で「全キーが token と一致すれば PEXPIRE」
//!
//! 複数ノードでの quorum 投票は行わない。リトライ・jitter・drift は acquire.rs 側。

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use redis::aio::MultiplexedConnection;

use super::acquire::{AttemptLock, acquire_with_retry};
use crate::config::LockSettings;
use crate::domain::{Lock, LockError, LockToken, RetryPolicy};
use crate::ports::{Clock, LockManager};

pub const DEFAULT_KEY_PREFIX: &str = "lock:";

static ACQUIRE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
for _, key in ipairs(KEYS) do
  if redis.call("exists", key) == 1 then
    return 0
  end
end
for _, key in ipairs(KEYS) do
  redis.call("set", key, ARGV[1], "PX", ARGV[2])
end
return 1
"#,
    )
});

static RELEASE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
local removed = 0
for _, key in ipairs(KEYS) do
  if redis.call("get", key) == ARGV[1] then
    redis.call("del", key)
    removed = removed + 1
  end
end
return removed
"#,
    )
});

static EXTEND_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
for _, key in ipairs(KEYS) do
  if redis.call("get", key) ~= ARGV[1] then
    return 0
  end
end
for _, key in ipairs(KEYS) do
  redis.call("pexpire", key, ARGV[2])
end
return 1
"#,
    )
});

impl From<redis::RedisError> for LockError {
    fn from(error: redis::RedisError) -> Self {
        LockError::Unavailable(error.to_string())
    }
}

/// Redis key holding the lock for `resource`.
pub fn lock_key(prefix: &str, resource: &str) -> String {
    format!("{prefix}{resource}")
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

pub struct RedisLockManager {
    connection: MultiplexedConnection,
    settings: LockSettings,
    clock: Arc<dyn Clock>,
    key_prefix: String,
}

impl RedisLockManager {
    pub fn new(
        connection: MultiplexedConnection,
        settings: LockSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            connection,
            settings,
            clock,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    pub async fn connect(
        url: &str,
        settings: LockSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LockError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self::new(connection, settings, clock))
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn keys(&self, resources: &[String]) -> Vec<String> {
        resources
            .iter()
            .map(|resource| lock_key(&self.key_prefix, resource))
            .collect()
    }
}

#[async_trait]
impl AttemptLock for RedisLockManager {
    async fn attempt(
        &self,
        resources: &[String],
        token: LockToken,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        let mut connection = self.connection.clone();
        let acquired: i64 = ACQUIRE_SCRIPT
            .key(self.keys(resources))
            .arg(token.to_string())
            .arg(ttl_millis(ttl))
            .invoke_async(&mut connection)
            .await?;
        Ok(acquired == 1)
    }

    async fn unlock(&self, resources: &[String], token: LockToken) -> Result<usize, LockError> {
        let mut connection = self.connection.clone();
        let removed: i64 = RELEASE_SCRIPT
            .key(self.keys(resources))
            .arg(token.to_string())
            .invoke_async(&mut connection)
            .await?;
        Ok(usize::try_from(removed).unwrap_or(0))
    }
}

#[async_trait]
impl LockManager for RedisLockManager {
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
        let started = self.clock.now();
        let mut connection = self.connection.clone();
        let extended: i64 = EXTEND_SCRIPT
            .key(self.keys(lock.resources()))
            .arg(lock.token().to_string())
            .arg(ttl_millis(ttl))
            .invoke_async(&mut connection)
            .await?;
        if extended != 1 {
            return Err(LockError::NotHeld {
                resources: lock.resources().to_vec(),
                token: lock.token(),
            });
        }

        let valid_until = RetryPolicy::from_settings(&self.settings)
            .valid_until(started, ttl)
            .unwrap_or(started);
        Ok(lock.renewed(valid_until))
    }
}

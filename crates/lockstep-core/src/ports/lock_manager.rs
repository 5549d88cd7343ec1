//! LockManager port - TTL 付き分散ロック
//!
//! Redlock 風のロックサービスを、契約だけで扱うための trait です。
//!
//! # 契約
//! - `acquire`: `retry_count` 回まで試行し、試行間は `retry_delay + jitter` 待つ。
//!   使い切ったら `LockError::AcquisitionFailed`
//! - `release`: ベストエフォート。トークンが一致するときだけ削除する
//! - `extend`: 保持中のロックの有効期限を延ばす（同じトークン）

use std::time::Duration;

use async_trait::async_trait;

use crate::config::LockSettings;
use crate::domain::{Lock, LockError};

#[async_trait]
pub trait LockManager: Send + Sync {
    /// Settings the manager was built with; callers read the extension
    /// threshold from here.
    fn settings(&self) -> &LockSettings;

    async fn acquire(&self, resources: &[String], ttl: Duration) -> Result<Lock, LockError>;

    async fn release(&self, lock: &Lock) -> Result<(), LockError>;

    async fn extend(&self, lock: &Lock, ttl: Duration) -> Result<Lock, LockError>;
}

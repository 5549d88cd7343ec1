//! Errors - ポート層のエラー型
//!
//! - `StoreError`: DocumentStore の失敗（接続不可・壊れたドキュメント）
//! - `LockError`: LockManager の失敗（取得失敗・所有権喪失・接続不可）

use thiserror::Error;

use super::ids::LockToken;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("document at key={key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("could not acquire lock on {resources:?} after {attempts} attempt(s)")]
    AcquisitionFailed {
        resources: Vec<String>,
        attempts: u32,
    },

    #[error("lock {token} on {resources:?} is no longer held")]
    NotHeld {
        resources: Vec<String>,
        token: LockToken,
    },

    #[error("invalid lock request: {0}")]
    InvalidRequest(String),

    #[error("lock service unavailable: {0}")]
    Unavailable(String),
}

//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryDocumentStore / InMemoryLockManager**: 開発用・テスト用
//! - **RedisDocumentStore / RedisLockManager**: 本番用（単一ノード Redis）
//! - **RecordingEventSink**: クリティカルセクションの重なり検証用

mod acquire;
pub mod inmem_lock;
pub mod inmem_store;
pub mod recording_sink;
pub mod redis_lock;
pub mod redis_store;

// 主要な型を再エクスポート
pub use self::inmem_lock::InMemoryLockManager;
pub use self::inmem_store::InMemoryDocumentStore;
pub use self::recording_sink::RecordingEventSink;
pub use self::redis_lock::RedisLockManager;
pub use self::redis_store::RedisDocumentStore;

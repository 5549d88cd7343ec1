//! lockstep-core
//!
//! Concurrent read-merge-write updates against one shared document, with and
//! without an external TTL lock serialising the critical section.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（document, ids, lock, state, outcome, events, errors, retry）
//! - **ports**: 抽象化レイヤー（DocumentStore, LockManager, Clock, EventSink）
//! - **app**: アプリケーションロジック（builder, lock_scope, update_task, orchestrator, verifier）
//! - **impls**: 実装（InMemory*, Redis*, RecordingEventSink）
//! - **config**: ロック・バッチ設定
//! - **observability**: tracing の初期化

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;

pub use self::app::{App, AppBuilder, Orchestrator, Verification, Verifier};
pub use self::config::{BatchSettings, Isolation, LockSettings};
pub use self::domain::{BatchResult, Document, EntryId, UpdateFailure, UpdateOutcome};
pub use self::error::LockstepError;

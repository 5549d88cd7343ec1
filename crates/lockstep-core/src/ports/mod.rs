//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（Redis, ロックサービス, 時計）へのインターフェースを提供し、
//! 実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - DocumentStore は get/set/del のみ（CAS なし、複数操作の原子性なし）
//! - LockManager はブラックボックス（acquire / release / extend の契約だけを使う）
//! - サスペンドポイントは DocumentStore と LockManager の呼び出しだけ

pub mod clock;
pub mod document_store;
pub mod event_sink;
pub mod lock_manager;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use self::document_store::DocumentStore;
pub use self::event_sink::{EventSink, NoopEventSink};
pub use self::lock_manager::LockManager;

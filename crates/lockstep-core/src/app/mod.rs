//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: アプリケーションの構築とワイヤリング
//! - **LockScope**: ロックの取得・自動延長・解放（RAII）
//! - **UpdateTask**: 1 エントリ分の read → merge → write
//! - **Orchestrator**: バッチ全体の並行起動と結果の収集
//! - **Verifier**: バッチ後のエントリ数検証

pub mod builder;
pub mod lock_scope;
pub mod orchestrator;
pub mod update_task;
pub mod verifier;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::lock_scope::LockScope;
pub use self::orchestrator::Orchestrator;
pub use self::update_task::{UpdateContext, UpdateTask};
pub use self::verifier::{Verification, Verifier, expected_count};

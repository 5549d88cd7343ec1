//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: 設定の矛盾はバッチを始める前に BuildError
//! - 省略可能な依存（Clock, EventSink）はデフォルト実装で埋める

use std::sync::Arc;

use tracing::info;

use super::orchestrator::Orchestrator;
use super::update_task::UpdateContext;
use super::verifier::{Verification, Verifier, expected_count};
use crate::config::{BatchSettings, ConfigError, Isolation, LockSettings};
use crate::domain::{BatchResult, Document, EntryId, StoreError};
use crate::error::LockstepError;
use crate::ports::{Clock, DocumentStore, EventSink, LockManager, NoopEventSink, SystemClock};

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new()
///     .store(store)
///     .lock_manager(locks)
///     .settings(BatchSettings::default())
///     .build()?;
/// let (batch, verification) = app.run_and_verify(&seed, &ids).await?;
/// ```
///
/// # Fail-fast 設計
/// - Exclusive なのに LockManager がなければ BuildError
/// - BatchSettings と LockSettings の組み合わせを build() 時に検証
pub struct AppBuilder {
    store: Option<Arc<dyn DocumentStore>>,
    locks: Option<Arc<dyn LockManager>>,
    clock: Option<Arc<dyn Clock>>,
    events: Option<Arc<dyn EventSink>>,
    settings: BatchSettings,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no document store configured")]
    MissingStore,

    #[error("exclusive isolation requires a lock manager")]
    MissingLockManager,

    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] ConfigError),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            locks: None,
            clock: None,
            events: None,
            settings: BatchSettings::default(),
        }
    }

    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn lock_manager(mut self, locks: Arc<dyn LockManager>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to [`NoopEventSink`].
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn settings(mut self, settings: BatchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn isolation(mut self, isolation: Isolation) -> Self {
        self.settings.isolation = isolation;
        self
    }

    /// AppBuilder を構築して App を生成
    ///
    /// # Errors
    /// - store がない → `MissingStore`
    /// - Exclusive で lock manager がない → `MissingLockManager`
    /// - 設定の検証に失敗 → `InvalidSettings`
    pub fn build(self) -> Result<App, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        if self.settings.isolation == Isolation::Exclusive && self.locks.is_none() {
            return Err(BuildError::MissingLockManager);
        }

        let lock_settings = self
            .locks
            .as_ref()
            .map(|locks| locks.settings().clone())
            .unwrap_or_else(LockSettings::default);
        self.settings.validate(&lock_settings)?;

        let ctx = UpdateContext {
            store: Arc::clone(&store),
            locks: self.locks,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            events: self.events.unwrap_or_else(|| Arc::new(NoopEventSink)),
            resources: vec![self.settings.resource.clone()],
            ttl: self.settings.ttl(),
        };

        Ok(App {
            orchestrator: Orchestrator::new(ctx, self.settings.isolation),
            verifier: Verifier::new(Arc::clone(&store)),
            store,
            settings: self.settings,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// App はワイヤリング済みのバッチ実行環境
pub struct App {
    orchestrator: Orchestrator,
    verifier: Verifier,
    store: Arc<dyn DocumentStore>,
    settings: BatchSettings,
}

impl App {
    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Resets the document to `seed`. An empty seed leaves the key absent.
    pub async fn prepare(&self, seed: &Document) -> Result<(), StoreError> {
        self.store.clear().await?;
        if !seed.is_empty() {
            self.store.write(seed).await?;
        }
        info!(key = self.store.key(), entries = seed.len(), "document prepared");
        Ok(())
    }

    pub async fn run(&self, ids: &[EntryId]) -> BatchResult {
        self.orchestrator.run_batch(ids).await
    }

    /// Seeds, runs one update per id, then checks no update was lost.
    ///
    /// A lost update is reported as `Verification::Fail`, not as an error.
    ///
    /// # Errors
    /// Only store failures during seeding or the final read.
    pub async fn run_and_verify(
        &self,
        seed: &Document,
        ids: &[EntryId],
    ) -> Result<(BatchResult, Verification), LockstepError> {
        self.prepare(seed).await?;
        let batch = self.run(ids).await;
        let verification = self.verifier.verify(expected_count(seed, ids)).await?;
        Ok((batch, verification))
    }

    /// Deletes the document key.
    pub async fn cleanup(&self) -> Result<(), StoreError> {
        self.store.clear().await
    }
}

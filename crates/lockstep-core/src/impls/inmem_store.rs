//! InMemoryDocumentStore - 開発用・テスト用のドキュメントストア
//!
//! # 学習ポイント
//! - 値は Redis と同じく JSON 文字列（不透明な blob）として保持する
//! - 各操作の前にサスペンドする（yield か latency 分の sleep）。
//!   これがないと単一スレッドでは read→write が割り込まれず、lost update が再現しない
//! - read / write の障害注入

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Document, StoreError};
use crate::ports::DocumentStore;

pub struct InMemoryDocumentStore {
    key: String,
    slot: Mutex<Option<String>>,
    latency: Option<Duration>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl InMemoryDocumentStore {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            slot: Mutex::new(None),
            latency: None,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        }
    }

    /// Sleep this long before every operation instead of just yielding.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// The stored blob, as another client would see it.
    pub async fn raw(&self) -> Option<String> {
        self.slot.lock().await.clone()
    }

    /// Overwrites the blob without going through the document codec.
    pub async fn put_raw(&self, raw: impl Into<String>) {
        *self.slot.lock().await = Some(raw.into());
    }

    async fn round_trip(&self) {
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn key(&self) -> &str {
        &self.key
    }

    async fn read(&self) -> Result<Option<Document>, StoreError> {
        self.round_trip().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read fault".into()));
        }

        let raw = self.slot.lock().await.clone();
        raw.map(|raw| {
            Document::from_json(&raw).map_err(|source| StoreError::Corrupt {
                key: self.key.clone(),
                source,
            })
        })
        .transpose()
    }

    async fn write(&self, document: &Document) -> Result<(), StoreError> {
        let raw = document.to_json().map_err(|source| StoreError::Corrupt {
            key: self.key.clone(),
            source,
        })?;

        self.round_trip().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write fault".into()));
        }

        *self.slot.lock().await = Some(raw);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.round_trip().await;
        *self.slot.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntryId;

    #[tokio::test]
    async fn test_read_absent_is_none() {
        let store = InMemoryDocumentStore::new("doc");
        assert!(store.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_read_clear() {
        let store = InMemoryDocumentStore::new("doc");
        let doc = Document::seeded([EntryId::from(1)]);

        store.write(&doc).await.unwrap();
        assert_eq!(store.read().await.unwrap(), Some(doc));
        assert_eq!(store.raw().await.as_deref(), Some(r#"{"data":{"1":1}}"#));
        assert_eq!(store.write_count(), 1);

        store.clear().await.unwrap();
        assert!(store.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let store = InMemoryDocumentStore::new("doc");
        store.fail_writes(true);
        let err = store.write(&Document::empty()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.write_count(), 0);

        store.fail_reads(true);
        assert!(matches!(
            store.read().await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_blob() {
        let store = InMemoryDocumentStore::new("doc");
        store.put_raw("{not json").await;
        assert!(matches!(
            store.read().await,
            Err(StoreError::Corrupt { key, .. }) if key == "doc"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_operations() {
        let store = InMemoryDocumentStore::new("doc").with_latency(Duration::from_millis(50));
        let start = tokio::time::Instant::now();
        store.read().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}

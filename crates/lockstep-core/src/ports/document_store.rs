//! DocumentStore port - 共有ドキュメントの保存先（Redis または InMemory）
//!
//! 1 つの固定キーに対する get / set / del だけを提供します。
//! read と write の間の原子性はない。だから外部ロックが必要になる。

use async_trait::async_trait;

use crate::domain::{Document, StoreError};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Key the document lives under.
    fn key(&self) -> &str;

    /// `Ok(None)` when the key is absent.
    async fn read(&self) -> Result<Option<Document>, StoreError>;

    /// Unconditional overwrite.
    async fn write(&self, document: &Document) -> Result<(), StoreError>;

    /// Removes the document. Clearing an absent key is not an error.
    async fn clear(&self) -> Result<(), StoreError>;
}

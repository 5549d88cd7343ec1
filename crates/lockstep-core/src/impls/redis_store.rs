//! RedisDocumentStore - 本番用のドキュメントストア
//!
//! 1 つのキーに対して GET / SET / DEL を発行するだけ。CAS は使わない。

use std::fmt;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::trace;

use crate::domain::{Document, StoreError};
use crate::ports::DocumentStore;

impl From<redis::RedisError> for StoreError {
    fn from(error: redis::RedisError) -> Self {
        StoreError::Unavailable(error.to_string())
    }
}

#[derive(Clone)]
pub struct RedisDocumentStore {
    connection: MultiplexedConnection,
    key: String,
}

impl RedisDocumentStore {
    pub fn new(connection: MultiplexedConnection, key: impl Into<String>) -> Self {
        Self {
            connection,
            key: key.into(),
        }
    }

    /// Opens a multiplexed connection to `url`.
    pub async fn connect(url: &str, key: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self::new(connection, key))
    }

    pub fn connection(&self) -> MultiplexedConnection {
        self.connection.clone()
    }
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    fn key(&self) -> &str {
        &self.key
    }

    async fn read(&self) -> Result<Option<Document>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection.get(&self.key).await?;
        trace!(key = %self.key, present = raw.is_some(), "GET");

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
        trace!(key = %self.key, entries = document.len(), "SET");

        let mut connection = self.connection.clone();
        let () = connection.set(&self.key, raw).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _removed: i64 = connection.del(&self.key).await?;
        Ok(())
    }
}

impl fmt::Debug for RedisDocumentStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RedisDocumentStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_errors_map_to_unavailable() {
        let error = redis::RedisError::from((redis::ErrorKind::IoError, "connection refused"));
        let mapped = StoreError::from(error);
        assert!(matches!(mapped, StoreError::Unavailable(msg) if msg.contains("connection refused")));
    }

    #[tokio::test]
    async fn connect_rejects_malformed_url() {
        let result = RedisDocumentStore::connect("not a redis url", "doc").await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn store_is_clone_and_debug() {
        fn assert_traits<T: Clone + fmt::Debug + Send + Sync>() {}
        assert_traits::<RedisDocumentStore>();
    }
}

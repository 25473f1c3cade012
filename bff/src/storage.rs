use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Opaque failure from a storage backend.
#[derive(Debug, Error)]
#[error("storage error: {0}")]
pub struct StorageError(String);

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Durable key-value persistence with per-key TTL.
///
/// Implementations own their retry policy; the crate performs single
/// attempts only.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory storage for development and tests. Expiry is enforced lazily
/// on read.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, (Value, Option<Instant>)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::new("storage lock poisoned"))?;
        let expired = matches!(
            entries.get(key),
            Some((_, Some(deadline))) if *deadline <= Instant::now()
        );
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|(value, _)| value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let deadline = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .write()
            .map_err(|_| StorageError::new("storage lock poisoned"))?
            .insert(key.to_string(), (value, deadline));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .map_err(|_| StorageError::new("storage lock poisoned"))?
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_delete_round_trip() {
        let storage = MemoryStorage::new();
        storage
            .set("session:did:plc:a", json!({"did": "did:plc:a"}), None)
            .await
            .unwrap();
        assert_eq!(
            storage.get("session:did:plc:a").await.unwrap(),
            Some(json!({"did": "did:plc:a"}))
        );

        storage.delete("session:did:plc:a").await.unwrap();
        assert_eq!(storage.get("session:did:plc:a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_are_gone_on_read() {
        let storage = MemoryStorage::new();
        storage
            .set("k", json!(1), Some(Duration::from_secs(0)))
            .await
            .unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_keys_read_as_none() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("nope").await.unwrap(), None);
        // Deleting a missing key is not an error.
        storage.delete("nope").await.unwrap();
    }
}

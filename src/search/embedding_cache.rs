//! Embedding caches keyed by tool id.
//!
//! A cached vector stays valid until it is deleted or the cache is cleared;
//! callers invalidate entries when a tool's description changes.

use crate::error::{DiscoveryError, Result};
use crate::loader::LruTtlCache;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Key-value store from tool id to embedding vector
#[async_trait]
pub trait EmbeddingCache: Send + Sync {
    /// Cached vector for a tool
    async fn get(&self, tool_id: &str) -> Result<Option<Vec<f32>>>;

    /// Stores a vector
    async fn set(&self, tool_id: &str, embedding: Vec<f32>) -> Result<()>;

    /// Drops a vector
    async fn delete(&self, tool_id: &str) -> Result<()>;

    /// Drops every vector
    async fn clear(&self) -> Result<()>;
}

/// Unbounded in-memory cache
#[derive(Debug, Default)]
pub struct InMemoryEmbeddingCache {
    entries: Mutex<HashMap<String, Vec<f32>>>,
}

impl InMemoryEmbeddingCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached vectors
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<f32>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EmbeddingCache for InMemoryEmbeddingCache {
    async fn get(&self, tool_id: &str) -> Result<Option<Vec<f32>>> {
        Ok(self.lock().get(tool_id).cloned())
    }

    async fn set(&self, tool_id: &str, embedding: Vec<f32>) -> Result<()> {
        self.lock().insert(tool_id.to_string(), embedding);
        Ok(())
    }

    async fn delete(&self, tool_id: &str) -> Result<()> {
        self.lock().remove(tool_id);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }
}

/// Size-bounded cache evicting the least recently used vector
#[derive(Debug)]
pub struct LruEmbeddingCache {
    entries: Mutex<LruTtlCache<String, Vec<f32>>>,
}

impl LruEmbeddingCache {
    /// Creates a cache holding at most `capacity` vectors
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruTtlCache::new(capacity, None)),
        }
    }

    /// Number of cached vectors
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, LruTtlCache<String, Vec<f32>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EmbeddingCache for LruEmbeddingCache {
    async fn get(&self, tool_id: &str) -> Result<Option<Vec<f32>>> {
        Ok(self.lock().get(&tool_id.to_string()))
    }

    async fn set(&self, tool_id: &str, embedding: Vec<f32>) -> Result<()> {
        self.lock().insert(tool_id.to_string(), embedding);
        Ok(())
    }

    async fn delete(&self, tool_id: &str) -> Result<()> {
        self.lock().remove(&tool_id.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }
}

/// String key-value store behind [`RemoteEmbeddingCache`], e.g. a Redis client
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads a value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Deletes a value
    async fn delete(&self, key: &str) -> Result<()>;

    /// Deletes every key starting with `prefix`, returning how many were removed
    async fn delete_prefix(&self, prefix: &str) -> Result<usize>;
}

/// Cache storing JSON-encoded vectors in a remote key-value store
pub struct RemoteEmbeddingCache<S> {
    store: S,
    prefix: String,
}

impl<S> fmt::Debug for RemoteEmbeddingCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteEmbeddingCache")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl<S: RemoteStore> RemoteEmbeddingCache<S> {
    /// Default key prefix
    pub const DEFAULT_PREFIX: &'static str = "tool-embedding:";

    /// Wraps a store using the default key prefix
    pub fn new(store: S) -> Self {
        Self::with_prefix(store, Self::DEFAULT_PREFIX)
    }

    /// Wraps a store using a custom key prefix
    pub fn with_prefix(store: S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn key(&self, tool_id: &str) -> String {
        format!("{}{}", self.prefix, tool_id)
    }
}

#[async_trait]
impl<S: RemoteStore> EmbeddingCache for RemoteEmbeddingCache<S> {
    async fn get(&self, tool_id: &str) -> Result<Option<Vec<f32>>> {
        match self.store.get(&self.key(tool_id)).await? {
            Some(raw) => {
                let vector = serde_json::from_str(&raw).map_err(|e| {
                    DiscoveryError::Embedding(format!(
                        "Corrupt cached embedding for {}: {}",
                        tool_id, e
                    ))
                })?;
                Ok(Some(vector))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, tool_id: &str, embedding: Vec<f32>) -> Result<()> {
        let raw = serde_json::to_string(&embedding)?;
        self.store.set(&self.key(tool_id), raw).await
    }

    async fn delete(&self, tool_id: &str) -> Result<()> {
        self.store.delete(&self.key(tool_id)).await
    }

    async fn clear(&self) -> Result<()> {
        self.store.delete_prefix(&self.prefix).await.map(|_| ())
    }
}

/// In-process [`RemoteStore`], for tests and single-node setups
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryRemoteStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no keys are stored
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let mut values = self.lock();
        let before = values.len();
        values.retain(|key, _| !key.starts_with(prefix));
        Ok(before - values.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_cache() {
        let cache = InMemoryEmbeddingCache::new();
        assert!(cache.get("a").await.unwrap().is_none());

        cache.set("a", vec![1.0, 2.0]).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), Some(vec![1.0, 2.0]));

        cache.delete("a").await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_lru_cache_is_bounded() {
        let cache = LruEmbeddingCache::new(2);
        cache.set("a", vec![1.0]).await.unwrap();
        cache.set("b", vec![2.0]).await.unwrap();
        cache.get("a").await.unwrap();
        cache.set("c", vec![3.0]).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").await.unwrap().is_none());
        assert!(cache.get("a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remote_cache_round_trip_and_clear() {
        let cache = RemoteEmbeddingCache::new(MemoryRemoteStore::new());
        cache.set("p:a", vec![0.5, -0.5]).await.unwrap();
        cache.set("p:b", vec![1.0]).await.unwrap();

        assert_eq!(cache.get("p:a").await.unwrap(), Some(vec![0.5, -0.5]));

        cache.clear().await.unwrap();
        assert!(cache.get("p:a").await.unwrap().is_none());
        assert!(cache.get("p:b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remote_cache_rejects_corrupt_entries() {
        let store = MemoryRemoteStore::new();
        store
            .set("tool-embedding:x", "not json".to_string())
            .await
            .unwrap();
        let cache = RemoteEmbeddingCache::new(store);

        let err = cache.get("x").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Embedding(_)));
    }
}

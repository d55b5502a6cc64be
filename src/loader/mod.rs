//! # Tool Loader
//!
//! Turns tool ids into invocable handles. Handles are fetched lazily from the
//! owning provider, kept in a size- and TTL-bounded LRU cache and evicted as
//! soon as the catalog reports their tool as removed.
//!
//! Concurrent loads of the same id are coalesced: the first caller registers
//! a shared pending future before awaiting anything and every later caller
//! awaits that same future.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tool_discovery::catalog::ToolCatalog;
//! use tool_discovery::loader::{LoaderConfig, ToolLoader};
//! use tool_discovery::tools::{InMemoryToolProvider, ToolDefinition, ToolProvider};
//!
//! # async fn example() -> tool_discovery::error::Result<()> {
//! let provider = Arc::new(InMemoryToolProvider::new("math"));
//! provider.register_fn(ToolDefinition::without_parameters("pi", "The number pi"), |_| {
//!     Ok(serde_json::json!(3.14159))
//! })?;
//!
//! let catalog = ToolCatalog::new();
//! catalog.register_provider(provider.clone()).await?;
//!
//! let loader = ToolLoader::new(catalog.clone(), catalog.providers(), LoaderConfig::default());
//! let pi = loader.load("math:pi").await?;
//! let value = pi.invoke(serde_json::Value::Null).await?;
//! # Ok(())
//! # }
//! ```

pub mod lru;

pub use lru::{LruStats, LruTtlCache};

use crate::catalog::{CatalogChange, SubscriptionId, ToolCatalog};
use crate::error::{DiscoveryError, Result};
use crate::telemetry::add_metric;
use crate::tools::{SharedTool, ToolProvider};
use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default maximum number of cached handles
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Default lifetime of a cached handle
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Loader options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Maximum number of cached handles
    pub max_size: usize,
    /// Lifetime of a cached handle; `None` keeps handles until evicted
    pub ttl: Option<Duration>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            ttl: Some(DEFAULT_TTL),
        }
    }
}

/// Loader counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Loads answered from the cache
    pub hits: u64,
    /// Loads that started a new fetch
    pub misses: u64,
    /// Provider round trips
    pub loads: u64,
    /// Handles dropped for capacity or invalidation
    pub evictions: u64,
    /// Handles dropped because their TTL elapsed
    pub expirations: u64,
}

type PendingLoad = Shared<BoxFuture<'static, Result<SharedTool>>>;

struct LoaderInner {
    catalog: Arc<ToolCatalog>,
    providers: RwLock<HashMap<String, Arc<dyn ToolProvider>>>,
    cache: Mutex<LruTtlCache<String, SharedTool>>,
    /// In-flight loads keyed by id, tagged with a sequence number so a load
    /// that was evicted mid-flight does not repopulate the cache
    pending: Mutex<HashMap<String, (u64, PendingLoad)>>,
    next_seq: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    invalidations: AtomicU64,
}

/// Lazy, deduplicating, catalog-aware cache of tool handles
pub struct ToolLoader {
    inner: Arc<LoaderInner>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl fmt::Debug for ToolLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Each lock is released before the next is taken
        let pending = self.inner.lock_pending().len();
        let cached = self.inner.lock_cache().len();
        let stats = self.stats();
        f.debug_struct("ToolLoader")
            .field("cached", &cached)
            .field("pending", &pending)
            .field("stats", &stats)
            .finish()
    }
}

impl ToolLoader {
    /// Creates a loader and subscribes it to the catalog's change stream
    pub fn new(
        catalog: Arc<ToolCatalog>,
        providers: HashMap<String, Arc<dyn ToolProvider>>,
        config: LoaderConfig,
    ) -> Self {
        let inner = Arc::new(LoaderInner {
            catalog: Arc::clone(&catalog),
            providers: RwLock::new(providers),
            cache: Mutex::new(LruTtlCache::new(config.max_size, config.ttl)),
            pending: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        });

        let weak = Arc::downgrade(&inner);
        let subscription = catalog.subscribe(move |change: CatalogChange| {
            let inner = weak.upgrade();
            async move {
                if let Some(inner) = inner {
                    for id in &change.removed {
                        inner.evict(id);
                    }
                }
                Ok(())
            }
        });

        Self {
            inner,
            subscription: Mutex::new(Some(subscription)),
        }
    }

    /// Makes another provider available for handle retrieval
    pub fn add_provider(&self, provider: Arc<dyn ToolProvider>) {
        let id = provider.id().to_string();
        self.inner
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, provider);
    }

    /// Returns the handle for a tool id, fetching it if needed.
    ///
    /// Fails with `ToolNotFound` if the catalog does not list the id,
    /// `SourceNotFound` if its provider is unknown to the loader, and
    /// `HandleUnavailable` if the provider has no handle for it.
    #[instrument(skip(self))]
    pub async fn load(&self, id: &str) -> Result<SharedTool> {
        if let Some(tool) = self.inner.cached(id) {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            add_metric("tool_loader_hit", 1.0, &[("tool_id", id.to_string())]);
            return Ok(tool);
        }

        self.inner.pending_or_start(id).await
    }

    /// Loads every id in parallel, ignoring failures.
    ///
    /// Returns how many handles are now available.
    pub async fn warmup<I, S>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<String> = ids.into_iter().map(|id| id.as_ref().to_string()).collect();
        let results = future::join_all(ids.iter().map(|id| self.load(id))).await;

        let mut loaded = 0;
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(_) => loaded += 1,
                Err(err) => debug!("Warmup of {} failed: {}", id, err),
            }
        }
        loaded
    }

    /// Drops a cached handle and any in-flight load for it
    pub fn evict(&self, id: &str) -> bool {
        self.inner.evict(id)
    }

    /// Drops every cached handle and in-flight load
    pub fn clear(&self) {
        self.inner.lock_pending().clear();
        self.inner.lock_cache().clear();
    }

    /// Unsubscribes from the catalog and clears the cache. Safe to call twice.
    pub fn dispose(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = subscription {
            self.inner.catalog.unsubscribe(id);
            debug!("Tool loader unsubscribed from catalog");
        }
        self.clear();
    }

    /// Number of live cached handles
    pub fn len(&self) -> usize {
        let mut cache = self.inner.lock_cache();
        cache.purge_expired();
        cache.len()
    }

    /// Returns true if no handle is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the id has a live cached handle
    pub fn is_cached(&self, id: &str) -> bool {
        self.inner.lock_cache().contains(&id.to_string())
    }

    /// Number of loads currently in flight
    pub fn pending_count(&self) -> usize {
        self.inner.lock_pending().len()
    }

    /// Counter snapshot
    pub fn stats(&self) -> LoaderStats {
        let lru = self.inner.lock_cache().stats();
        LoaderStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            loads: self.inner.loads.load(Ordering::Relaxed),
            evictions: lru.evictions + self.inner.invalidations.load(Ordering::Relaxed),
            expirations: lru.expirations,
        }
    }
}

impl Drop for ToolLoader {
    fn drop(&mut self) {
        let subscription = self
            .subscription
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = subscription {
            self.inner.catalog.unsubscribe(id);
        }
    }
}

impl LoaderInner {
    fn cached(&self, id: &str) -> Option<SharedTool> {
        self.lock_cache().get(&id.to_string())
    }

    /// Joins the in-flight load for `id` or registers a new one.
    ///
    /// Runs entirely under the pending lock, so at most one load per id exists.
    fn pending_or_start(self: &Arc<Self>, id: &str) -> PendingLoad {
        let mut pending = self.lock_pending();
        if let Some((_, load)) = pending.get(id) {
            debug!("Joining in-flight load for {}", id);
            return load.clone();
        }

        // A load may have completed between the cache check and taking the lock
        if let Some(tool) = self.cached(id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return future::ready(Ok(tool)).boxed().shared();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        add_metric("tool_loader_miss", 1.0, &[("tool_id", id.to_string())]);

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(self);
        let tool_id = id.to_string();
        let load = async move {
            let result = inner.fetch(&tool_id).await;
            inner.finish(&tool_id, seq, &result);
            result
        }
        .boxed()
        .shared();

        pending.insert(id.to_string(), (seq, load.clone()));
        load
    }

    async fn fetch(&self, id: &str) -> Result<SharedTool> {
        let metadata = self
            .catalog
            .get_metadata(id)
            .ok_or_else(|| DiscoveryError::ToolNotFound { id: id.to_string() })?;

        let provider = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&metadata.source_id)
            .cloned()
            .ok_or_else(|| DiscoveryError::SourceNotFound {
                tool_id: id.to_string(),
                source_id: metadata.source_id.clone(),
            })?;

        self.loads.fetch_add(1, Ordering::Relaxed);
        debug!("Fetching {} from provider {}", id, metadata.source_id);

        provider
            .get_tool(&metadata.name)
            .await?
            .ok_or_else(|| DiscoveryError::HandleUnavailable {
                id: id.to_string(),
                source_id: metadata.source_id.clone(),
            })
    }

    /// Clears the in-flight marker and caches a successful result, unless the
    /// id was evicted while the load was running
    fn finish(&self, id: &str, seq: u64, result: &Result<SharedTool>) {
        let mut pending = self.lock_pending();
        let current = matches!(pending.get(id), Some((registered, _)) if *registered == seq);
        if !current {
            debug!("Load of {} was evicted in flight; not caching", id);
            return;
        }
        pending.remove(id);

        match result {
            Ok(tool) => {
                let dropped = self.lock_cache().insert(id.to_string(), Arc::clone(tool));
                if !dropped.is_empty() {
                    debug!("Cache full; dropped {:?}", dropped);
                }
            }
            Err(err) => warn!("Failed to load tool {}: {}", id, err),
        }
    }

    fn evict(&self, id: &str) -> bool {
        let was_pending = self.lock_pending().remove(id).is_some();
        let was_cached = self.lock_cache().remove(&id.to_string()).is_some();
        if was_cached {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
            debug!("Evicted tool {}", id);
        }
        was_cached || was_pending
    }

    fn lock_cache(&self) -> MutexGuard<'_, LruTtlCache<String, SharedTool>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<String, (u64, PendingLoad)>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{InMemoryToolProvider, ToolDefinition};
    use serde_json::json;

    async fn setup(names: &[&str], config: LoaderConfig) -> (Arc<ToolCatalog>, ToolLoader) {
        let provider = Arc::new(InMemoryToolProvider::new("p"));
        for name in names {
            provider
                .register_fn(ToolDefinition::without_parameters(name, "test tool"), |_| {
                    Ok(json!("ok"))
                })
                .unwrap();
        }
        let catalog = ToolCatalog::new();
        catalog.register_provider(provider).await.unwrap();
        let loader = ToolLoader::new(Arc::clone(&catalog), catalog.providers(), config);
        (catalog, loader)
    }

    #[tokio::test]
    async fn test_second_load_is_a_cache_hit() {
        let (_catalog, loader) = setup(&["a"], LoaderConfig::default()).await;

        let first = loader.load("p:a").await.unwrap();
        let second = loader.load("p:a").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let stats = loader.stats();
        assert_eq!(stats.loads, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found_and_not_cached() {
        let (_catalog, loader) = setup(&["a"], LoaderConfig::default()).await;

        let err = loader.load("p:missing").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::ToolNotFound { .. }));
        assert_eq!(loader.pending_count(), 0);
        assert!(loader.is_empty());
    }

    #[tokio::test]
    async fn test_missing_provider_is_source_not_found() {
        let (catalog, _) = setup(&["a"], LoaderConfig::default()).await;
        let loader = ToolLoader::new(Arc::clone(&catalog), HashMap::new(), LoaderConfig::default());

        let err = loader.load("p:a").await.unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::SourceNotFound { ref source_id, .. } if source_id == "p"
        ));
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recent() {
        let config = LoaderConfig {
            max_size: 2,
            ttl: None,
        };
        let (_catalog, loader) = setup(&["a", "b", "c"], config).await;

        assert_eq!(loader.warmup(["p:a", "p:b", "p:c"]).await, 3);
        assert_eq!(loader.len(), 2);
        assert_eq!(loader.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expires_handles() {
        let config = LoaderConfig {
            max_size: 10,
            ttl: Some(Duration::from_secs(5)),
        };
        let (_catalog, loader) = setup(&["a"], config).await;

        loader.load("p:a").await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        assert!(!loader.is_cached("p:a"));
        loader.load("p:a").await.unwrap();
        assert_eq!(loader.stats().loads, 2);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let (catalog, loader) = setup(&["a"], LoaderConfig::default()).await;
        assert_eq!(catalog.changes().listener_count(), 1);

        loader.load("p:a").await.unwrap();
        loader.dispose();
        loader.dispose();

        assert!(loader.is_empty());
        assert_eq!(catalog.changes().listener_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let (catalog, loader) = setup(&["a"], LoaderConfig::default()).await;
        drop(loader);
        assert_eq!(catalog.changes().listener_count(), 0);
    }

    #[tokio::test]
    async fn test_debug_format_returns() {
        let (_catalog, loader) = setup(&["a"], LoaderConfig::default()).await;
        loader.load("p:a").await.unwrap();

        let rendered = tokio::time::timeout(
            Duration::from_secs(5),
            tokio::task::spawn_blocking(move || format!("{:?}", loader)),
        )
        .await
        .expect("formatting a loader must not block")
        .unwrap();

        assert!(rendered.contains("cached: 1"));
        assert!(rendered.contains("pending: 0"));
    }
}

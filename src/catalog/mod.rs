//! # Tool Catalog
//!
//! Aggregated, namespaced registry of tool metadata across all providers.
//! Every registration, removal or refresh emits a [`CatalogChange`] diff
//! through the catalog's [`ChangeEmitter`].

mod events;
mod types;

pub use events::{ChangeEmitter, ChangeListener, SubscriptionId};
pub use types::{namespaced_id, CatalogChange, ToolMetadata};

use crate::error::{DiscoveryError, Result};
use crate::tools::ToolProvider;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

struct SourceEntry {
    provider: Arc<dyn ToolProvider>,
    tool_ids: Vec<String>,
    refresh_task: Option<JoinHandle<()>>,
}

/// Registry of tool metadata keyed by namespaced tool id
#[derive(Default)]
pub struct ToolCatalog {
    sources: RwLock<HashMap<String, SourceEntry>>,
    metadata: RwLock<BTreeMap<String, ToolMetadata>>,
    changes: ChangeEmitter,
}

impl fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources = self.read_sources().len();
        let tools = self.read_metadata().len();
        f.debug_struct("ToolCatalog")
            .field("sources", &sources)
            .field("tools", &tools)
            .field("changes", &self.changes)
            .finish()
    }
}

impl ToolCatalog {
    /// Creates an empty catalog
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a provider and ingests its current listing.
    ///
    /// Tool ids are rewritten to `"{provider_id}:{name}"`. If the provider
    /// exposes refresh events, every refresh replaces its entries wholesale.
    #[instrument(skip(self, provider), fields(provider.id = %provider.id()))]
    pub async fn register_provider(
        self: &Arc<Self>,
        provider: Arc<dyn ToolProvider>,
    ) -> Result<Vec<String>> {
        let source_id = provider.id().to_string();
        if self.read_sources().contains_key(&source_id) {
            return Err(DiscoveryError::Config(format!(
                "Provider '{}' is already registered",
                source_id
            )));
        }

        let listing = provider.get_metadata().await?;
        let entries = namespace_listing(provider.as_ref(), listing);
        let tool_ids: Vec<String> = entries.iter().map(|meta| meta.id.clone()).collect();

        {
            // Another registration of the same id may have won while listing
            let mut sources = self.write_sources();
            let Entry::Vacant(slot) = sources.entry(source_id.clone()) else {
                return Err(DiscoveryError::Config(format!(
                    "Provider '{}' is already registered",
                    source_id
                )));
            };

            let mut metadata = self.write_metadata();
            for entry in entries {
                metadata.insert(entry.id.clone(), entry);
            }

            let refresh_task = provider
                .refresh_events()
                .map(|events| self.spawn_refresh_listener(source_id.clone(), events));

            slot.insert(SourceEntry {
                provider,
                tool_ids: tool_ids.clone(),
                refresh_task,
            });
        }

        info!("Registered provider {} with {} tools", source_id, tool_ids.len());
        self.changes
            .emit(CatalogChange {
                added: tool_ids.clone(),
                removed: Vec::new(),
            })
            .await;

        Ok(tool_ids)
    }

    /// Unregisters a provider and drops all of its tools.
    ///
    /// Returns the removed ids; an unknown provider removes nothing.
    #[instrument(skip(self))]
    pub async fn unregister_provider(&self, source_id: &str) -> Vec<String> {
        let Some(entry) = self.write_sources().remove(source_id) else {
            debug!("Provider {} is not registered", source_id);
            return Vec::new();
        };

        if let Some(task) = entry.refresh_task {
            task.abort();
        }

        {
            let mut metadata = self.write_metadata();
            for id in &entry.tool_ids {
                metadata.remove(id);
            }
        }

        info!("Unregistered provider {} ({} tools)", source_id, entry.tool_ids.len());
        self.changes
            .emit(CatalogChange {
                added: Vec::new(),
                removed: entry.tool_ids.clone(),
            })
            .await;

        entry.tool_ids
    }

    /// Re-pulls a provider's listing and applies it as a refresh
    pub async fn refresh_provider(&self, source_id: &str) -> Result<CatalogChange> {
        let provider = self.provider(source_id).ok_or_else(|| DiscoveryError::SourceNotFound {
            tool_id: String::new(),
            source_id: source_id.to_string(),
        })?;

        let listing = provider.get_metadata().await?;
        Ok(self.apply_listing(source_id, listing).await)
    }

    /// Replaces a provider's entries with a fresh listing and emits the diff
    #[instrument(skip(self, listing), fields(tools = listing.len()))]
    pub async fn apply_listing(&self, source_id: &str, listing: Vec<ToolMetadata>) -> CatalogChange {
        let change = {
            let mut sources = self.write_sources();
            let Some(entry) = sources.get_mut(source_id) else {
                warn!("Ignoring refresh for unregistered provider {}", source_id);
                return CatalogChange::default();
            };

            let entries = namespace_listing(entry.provider.as_ref(), listing);
            let new_ids: Vec<String> = entries.iter().map(|meta| meta.id.clone()).collect();

            let removed: Vec<String> = entry
                .tool_ids
                .iter()
                .filter(|id| !new_ids.contains(id))
                .cloned()
                .collect();
            let added: Vec<String> = new_ids
                .iter()
                .filter(|id| !entry.tool_ids.contains(id))
                .cloned()
                .collect();

            let mut metadata = self.write_metadata();
            for id in &entry.tool_ids {
                metadata.remove(id);
            }
            for meta in entries {
                metadata.insert(meta.id.clone(), meta);
            }
            entry.tool_ids = new_ids;

            CatalogChange { added, removed }
        };

        if !change.is_empty() {
            debug!(
                "Provider {} refreshed: {} added, {} removed",
                source_id,
                change.added.len(),
                change.removed.len()
            );
            self.changes.emit(change.clone()).await;
        }

        change
    }

    /// Metadata for one tool id
    pub fn get_metadata(&self, id: &str) -> Option<ToolMetadata> {
        self.read_metadata().get(id).cloned()
    }

    /// Snapshot of every tool's metadata, ordered by id
    pub fn all_metadata(&self) -> Vec<ToolMetadata> {
        self.read_metadata().values().cloned().collect()
    }

    /// Registered provider by id
    pub fn provider(&self, source_id: &str) -> Option<Arc<dyn ToolProvider>> {
        self.read_sources()
            .get(source_id)
            .map(|entry| Arc::clone(&entry.provider))
    }

    /// Map of provider id to provider
    pub fn providers(&self) -> HashMap<String, Arc<dyn ToolProvider>> {
        self.read_sources()
            .iter()
            .map(|(id, entry)| (id.clone(), Arc::clone(&entry.provider)))
            .collect()
    }

    /// Ids of registered providers
    pub fn source_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read_sources().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of cataloged tools
    pub fn len(&self) -> usize {
        self.read_metadata().len()
    }

    /// Returns true if no tools are cataloged
    pub fn is_empty(&self) -> bool {
        self.read_metadata().is_empty()
    }

    /// Change notification registry
    pub fn changes(&self) -> &ChangeEmitter {
        &self.changes
    }

    /// Subscribes to change notifications
    pub fn subscribe<F, Fut>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(CatalogChange) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.changes.subscribe(listener)
    }

    /// Removes a change subscription
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.changes.unsubscribe(id)
    }

    fn spawn_refresh_listener(
        self: &Arc<Self>,
        source_id: String,
        mut events: tokio::sync::broadcast::Receiver<Vec<ToolMetadata>>,
    ) -> JoinHandle<()> {
        let catalog: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(listing) => {
                        let Some(catalog) = catalog.upgrade() else {
                            break;
                        };
                        catalog.apply_listing(&source_id, listing).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Refresh listener for {} skipped {} updates", source_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn read_sources(&self) -> RwLockReadGuard<'_, HashMap<String, SourceEntry>> {
        self.sources.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_sources(&self) -> RwLockWriteGuard<'_, HashMap<String, SourceEntry>> {
        self.sources.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_metadata(&self) -> RwLockReadGuard<'_, BTreeMap<String, ToolMetadata>> {
        self.metadata.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_metadata(&self) -> RwLockWriteGuard<'_, BTreeMap<String, ToolMetadata>> {
        self.metadata.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ToolCatalog {
    fn drop(&mut self) {
        let sources = self.sources.get_mut().unwrap_or_else(PoisonError::into_inner);
        for entry in sources.values_mut() {
            if let Some(task) = entry.refresh_task.take() {
                task.abort();
            }
        }
    }
}

fn namespace_listing(provider: &dyn ToolProvider, listing: Vec<ToolMetadata>) -> Vec<ToolMetadata> {
    let source_id = provider.id();
    let kind = provider.kind();
    listing
        .into_iter()
        .map(|mut meta| {
            meta.id = namespaced_id(source_id, &meta.name);
            meta.source_id = source_id.to_string();
            meta.source = kind.to_string();
            meta
        })
        .collect()
}

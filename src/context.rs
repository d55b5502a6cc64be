//! Explicitly constructed wiring of catalog, search index and loader.
//!
//! Nothing in the crate reaches for a shared global: a [`DiscoveryContext`]
//! owns one catalog, one index and one loader, keeps the index in step with
//! catalog changes and hands them to the discovery loop.

use crate::catalog::{CatalogChange, SubscriptionId, ToolCatalog};
use crate::discovery::{DiscoveryAgent, DiscoveryConfig};
use crate::error::Result;
use crate::llm::ChatModel;
use crate::loader::{LoaderConfig, ToolLoader};
use crate::search::{EmbeddingCache, EmbeddingProvider, SearchIndex, SearchIndexConfig};
use crate::tools::{InMemoryToolProvider, SharedTool, ToolProvider};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Provider id given to tools passed as [`ToolSet::Tools`]
pub const LOCAL_PROVIDER_ID: &str = "local";

/// What a context is built from
pub enum ToolSet {
    /// Ready handles, served by one in-memory provider named [`LOCAL_PROVIDER_ID`]
    Tools(Vec<SharedTool>),
    /// Tool providers, each namespacing its own tools
    Providers(Vec<Arc<dyn ToolProvider>>),
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolSet::Tools(tools) => f.debug_tuple("Tools").field(&tools.len()).finish(),
            ToolSet::Providers(providers) => {
                let ids: Vec<&str> = providers.iter().map(|provider| provider.id()).collect();
                f.debug_tuple("Providers").field(&ids).finish()
            }
        }
    }
}

/// Options for [`DiscoveryContext::build`]
#[derive(Default)]
pub struct ContextOptions {
    /// Search index options
    pub search: SearchIndexConfig,
    /// Embedding provider, required by vector and hybrid modes
    pub embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    /// Embedding cache
    pub embedding_cache: Option<Arc<dyn EmbeddingCache>>,
    /// Loader options
    pub loader: LoaderConfig,
}

impl fmt::Debug for ContextOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOptions")
            .field("search", &self.search)
            .field("embedding_provider", &self.embedding_provider.is_some())
            .field("embedding_cache", &self.embedding_cache.is_some())
            .field("loader", &self.loader)
            .finish()
    }
}

/// Catalog, index and loader for one tool universe
pub struct DiscoveryContext {
    catalog: Arc<ToolCatalog>,
    index: Arc<SearchIndex>,
    loader: Arc<ToolLoader>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl fmt::Debug for DiscoveryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryContext")
            .field("catalog", &self.catalog)
            .field("index", &self.index)
            .field("loader", &self.loader)
            .finish()
    }
}

impl DiscoveryContext {
    /// Registers the tools, indexes them and wires up change propagation.
    ///
    /// Configuration errors of the search index surface before any provider
    /// is contacted.
    pub async fn build(tools: ToolSet, options: ContextOptions) -> Result<Self> {
        let mut builder = SearchIndex::builder().config(options.search);
        if let Some(provider) = options.embedding_provider {
            builder = builder.embedding_provider(provider);
        }
        if let Some(cache) = options.embedding_cache {
            builder = builder.embedding_cache(cache);
        }
        let index = Arc::new(builder.build()?);

        let providers: Vec<Arc<dyn ToolProvider>> = match tools {
            ToolSet::Tools(tools) => {
                let local: Arc<dyn ToolProvider> =
                    Arc::new(InMemoryToolProvider::with_tools(LOCAL_PROVIDER_ID, tools)?);
                vec![local]
            }
            ToolSet::Providers(providers) => providers,
        };

        let catalog = ToolCatalog::new();
        for provider in providers {
            catalog.register_provider(provider).await?;
        }

        let loader = Arc::new(ToolLoader::new(
            Arc::clone(&catalog),
            catalog.providers(),
            options.loader,
        ));

        index.index(catalog.all_metadata()).await?;

        let weak_catalog = Arc::downgrade(&catalog);
        let sync_index = Arc::clone(&index);
        let subscription = catalog.subscribe(move |change: CatalogChange| {
            let catalog = weak_catalog.upgrade();
            let index = Arc::clone(&sync_index);
            async move {
                let Some(catalog) = catalog else {
                    return Ok(());
                };
                index.invalidate_embeddings(&change.removed).await;
                debug!(
                    "Re-indexing after catalog change (+{} -{})",
                    change.added.len(),
                    change.removed.len()
                );
                index.index(catalog.all_metadata()).await
            }
        });

        info!(
            "Discovery context ready: {} providers, {} tools",
            catalog.source_ids().len(),
            catalog.len()
        );

        Ok(Self {
            catalog,
            index,
            loader,
            subscription: Mutex::new(Some(subscription)),
        })
    }

    /// The tool catalog
    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    /// The search index
    pub fn index(&self) -> &Arc<SearchIndex> {
        &self.index
    }

    /// The tool loader
    pub fn loader(&self) -> &Arc<ToolLoader> {
        &self.loader
    }

    /// Adds a provider; the index is rebuilt through the catalog's change event.
    ///
    /// The loader only learns about providers the catalog accepted.
    pub async fn add_provider(&self, provider: Arc<dyn ToolProvider>) -> Result<Vec<String>> {
        let ids = self.catalog.register_provider(Arc::clone(&provider)).await?;
        self.loader.add_provider(provider);
        Ok(ids)
    }

    /// Removes a provider and its tools
    pub async fn remove_provider(&self, source_id: &str) -> Vec<String> {
        self.catalog.unregister_provider(source_id).await
    }

    /// Discovery loop over this context's index and loader
    pub fn agent(&self, model: Arc<dyn ChatModel>, config: DiscoveryConfig) -> Result<DiscoveryAgent> {
        DiscoveryAgent::new(model, Arc::clone(&self.index), Arc::clone(&self.loader), config)
    }

    /// Stops index syncing and disposes the loader. Safe to call twice.
    pub fn dispose(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = subscription {
            self.catalog.unsubscribe(id);
        }
        self.loader.dispose();
    }
}

impl Drop for DiscoveryContext {
    fn drop(&mut self) {
        let subscription = self
            .subscription
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = subscription {
            self.catalog.unsubscribe(id);
        }
    }
}

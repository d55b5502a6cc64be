//! The tool search index: keyword, vector and hybrid retrieval over one
//! snapshot of tool metadata.

use crate::catalog::ToolMetadata;
use crate::error::{DiscoveryError, Result};
use crate::search::embedding::EmbeddingProvider;
use crate::search::embedding_cache::EmbeddingCache;
use crate::search::keyword::{Bm25Index, FieldBoosts, KeywordDocument, KeywordIndex};
use crate::search::normalize::{
    clamp_unit, merge_and_rank, min_max_normalize, FusionStrategy, FusionWeights, ScoredId,
};
use crate::search::types::{SearchMode, SearchOptions, SearchResult, ToolMatch};
use crate::search::vector::{FlatVectorIndex, VectorIndex};
use crate::telemetry::{add_metric, span_duration};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Creates an empty keyword structure for each `index()` call
pub type KeywordIndexFactory = Arc<dyn Fn() -> Box<dyn KeywordIndex> + Send + Sync>;

/// Creates an empty vector structure for each `index()` call
pub type VectorIndexFactory = Arc<dyn Fn() -> Box<dyn VectorIndex> + Send + Sync>;

/// Static options of a [`SearchIndex`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchIndexConfig {
    /// Default retrieval mode
    #[serde(default)]
    pub mode: SearchMode,

    /// Keyword field boosts
    #[serde(default)]
    pub boosts: FieldBoosts,

    /// Hybrid fusion weights
    #[serde(default)]
    pub weights: FusionWeights,

    /// Hybrid fusion strategy
    #[serde(default)]
    pub fusion: FusionStrategy,

    /// Expected embedding size; vectors of any other size are rejected
    #[serde(default)]
    pub dimensions: Option<usize>,
}

struct IndexState {
    tools: Vec<ToolMetadata>,
    by_id: HashMap<String, usize>,
    keyword: Box<dyn KeywordIndex>,
    vector: Option<Box<dyn VectorIndex>>,
}

impl IndexState {
    fn get(&self, id: &str) -> Option<&ToolMetadata> {
        self.by_id.get(id).and_then(|&pos| self.tools.get(pos))
    }
}

/// Builder for [`SearchIndex`]
pub struct SearchIndexBuilder {
    config: SearchIndexConfig,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    cache: Option<Arc<dyn EmbeddingCache>>,
    keyword_factory: KeywordIndexFactory,
    vector_factory: VectorIndexFactory,
}

impl fmt::Debug for SearchIndexBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchIndexBuilder")
            .field("config", &self.config)
            .field("embeddings", &self.embeddings.is_some())
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl SearchIndexBuilder {
    /// Replaces the whole configuration
    pub fn config(mut self, config: SearchIndexConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the default retrieval mode
    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Sets the keyword field boosts
    pub fn boosts(mut self, boosts: FieldBoosts) -> Self {
        self.config.boosts = boosts;
        self
    }

    /// Sets the hybrid fusion weights
    pub fn weights(mut self, weights: FusionWeights) -> Self {
        self.config.weights = weights;
        self
    }

    /// Sets the hybrid fusion strategy
    pub fn fusion(mut self, fusion: FusionStrategy) -> Self {
        self.config.fusion = fusion;
        self
    }

    /// Sets the expected embedding size
    pub fn dimensions(mut self, dimensions: usize) -> Self {
        self.config.dimensions = Some(dimensions);
        self
    }

    /// Sets the embedding provider
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings = Some(provider);
        self
    }

    /// Sets the embedding cache
    pub fn embedding_cache(mut self, cache: Arc<dyn EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the keyword backend
    pub fn keyword_backend<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn KeywordIndex> + Send + Sync + 'static,
    {
        self.keyword_factory = Arc::new(factory);
        self
    }

    /// Replaces the vector backend
    pub fn vector_backend<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn VectorIndex> + Send + Sync + 'static,
    {
        self.vector_factory = Arc::new(factory);
        self
    }

    /// Builds the index.
    ///
    /// Fails with a configuration error if the mode needs embeddings and no
    /// provider was given.
    pub fn build(self) -> Result<SearchIndex> {
        if self.config.mode.requires_embeddings() && self.embeddings.is_none() {
            return Err(DiscoveryError::Config(format!(
                "Search mode '{}' requires an embedding provider",
                self.config.mode
            )));
        }

        Ok(SearchIndex {
            config: self.config,
            embeddings: self.embeddings,
            cache: self.cache,
            keyword_factory: self.keyword_factory,
            vector_factory: self.vector_factory,
            state: RwLock::new(None),
        })
    }
}

/// Relevance index over a snapshot of tool metadata
pub struct SearchIndex {
    config: SearchIndexConfig,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    cache: Option<Arc<dyn EmbeddingCache>>,
    keyword_factory: KeywordIndexFactory,
    vector_factory: VectorIndexFactory,
    state: RwLock<Option<IndexState>>,
}

impl fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchIndex")
            .field("config", &self.config)
            .field("embeddings", &self.embeddings.is_some())
            .field("cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl SearchIndex {
    /// Starts building an index with BM25 and flat cosine backends
    pub fn builder() -> SearchIndexBuilder {
        SearchIndexBuilder {
            config: SearchIndexConfig::default(),
            embeddings: None,
            cache: None,
            keyword_factory: Arc::new(|| Box::new(Bm25Index::new())),
            vector_factory: Arc::new(|| Box::new(FlatVectorIndex::new())),
        }
    }

    /// Keyword-only index with default options
    pub fn keyword() -> Self {
        Self {
            config: SearchIndexConfig::default(),
            embeddings: None,
            cache: None,
            keyword_factory: Arc::new(|| Box::new(Bm25Index::new())),
            vector_factory: Arc::new(|| Box::new(FlatVectorIndex::new())),
            state: RwLock::new(None),
        }
    }

    /// Static configuration
    pub fn config(&self) -> &SearchIndexConfig {
        &self.config
    }

    /// Default retrieval mode
    pub fn mode(&self) -> SearchMode {
        self.config.mode
    }

    /// Replaces the index with a new snapshot of tools
    #[instrument(skip(self, tools), fields(tools = tools.len(), mode = %self.config.mode))]
    pub async fn index(&self, tools: Vec<ToolMetadata>) -> Result<()> {
        let vector = if self.config.mode.requires_embeddings() {
            let mut embeddings = self.compute_embeddings(&tools).await?;
            let entries: Vec<(String, Vec<f32>)> = tools
                .iter()
                .filter_map(|tool| {
                    embeddings
                        .remove(&tool.id)
                        .map(|vector| (tool.id.clone(), vector))
                })
                .collect();

            let mut index = (self.vector_factory)();
            index.build(entries);
            Some(index)
        } else {
            None
        };

        let mut keyword = (self.keyword_factory)();
        keyword.build(
            tools.iter().map(KeywordDocument::from_metadata).collect(),
            self.config.boosts,
        );

        let by_id = tools
            .iter()
            .enumerate()
            .map(|(pos, tool)| (tool.id.clone(), pos))
            .collect();

        let count = tools.len();
        *self.state.write().await = Some(IndexState {
            tools,
            by_id,
            keyword,
            vector,
        });

        info!("Indexed {} tools", count);
        add_metric("search_index_tools", count as f64, &[]);
        Ok(())
    }

    /// Re-runs `index()` over the last indexed snapshot
    pub async fn reindex(&self) -> Result<()> {
        let tools = {
            let state = self.state.read().await;
            state
                .as_ref()
                .map(|state| state.tools.clone())
                .ok_or(DiscoveryError::NothingToReindex)?
        };
        self.index(tools).await
    }

    /// Ranked tool ids for a query
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        Ok(self
            .search_tools(query, options)
            .await?
            .into_iter()
            .map(|hit| hit.result)
            .collect())
    }

    /// Ranked tools, with their indexed metadata, for a query.
    ///
    /// Scoring order: mode-specific scores, category filter, threshold,
    /// then the limit.
    #[instrument(skip(self, options), fields(limit = options.limit))]
    pub async fn search_tools(&self, query: &str, options: &SearchOptions) -> Result<Vec<ToolMatch>> {
        let _timer = span_duration("tool_search_duration_ms");

        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(DiscoveryError::NotInitialized)?;
        let mode = options.mode.unwrap_or(self.config.mode);

        // A category filter may drop candidates, so score everything
        let candidates = if options.categories.is_empty() {
            options.limit
        } else {
            state.tools.len().max(options.limit)
        };

        let hits = match mode {
            SearchMode::Keyword => keyword_hits(state, query, candidates),
            SearchMode::Vector => self.vector_hits(state, query, candidates).await?,
            SearchMode::Hybrid => {
                let breadth = candidates.saturating_mul(2);
                let (keyword, vector) = futures::join!(
                    async { keyword_hits(state, query, breadth) },
                    self.vector_hits(state, query, breadth)
                );
                merge_and_rank(&keyword, &vector?, self.config.fusion, self.config.weights)
            }
        };

        let match_type = mode.match_type();
        let results: Vec<ToolMatch> = hits
            .into_iter()
            .filter_map(|hit| state.get(&hit.id).map(|metadata| (hit, metadata)))
            .filter(|(_, metadata)| {
                options.categories.is_empty() || metadata.has_any_category(&options.categories)
            })
            .filter(|(hit, _)| options.threshold.map_or(true, |floor| hit.score >= floor))
            .take(options.limit)
            .map(|(hit, metadata)| ToolMatch {
                metadata: metadata.clone(),
                result: SearchResult {
                    tool_id: hit.id,
                    score: hit.score,
                    match_type,
                },
            })
            .collect();

        debug!("{} search for {:?} returned {} tools", mode, query, results.len());
        Ok(results)
    }

    /// Indexed metadata for a tool id
    pub async fn get(&self, id: &str) -> Option<ToolMetadata> {
        let state = self.state.read().await;
        state.as_ref().and_then(|state| state.get(id).cloned())
    }

    /// Number of indexed tools, 0 before the first `index()`
    pub async fn count(&self) -> usize {
        self.state
            .read()
            .await
            .as_ref()
            .map_or(0, |state| state.tools.len())
    }

    /// Returns true once `index()` has completed
    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Drops cached embeddings of the given tools
    pub async fn invalidate_embeddings(&self, ids: &[String]) {
        let Some(cache) = &self.cache else {
            return;
        };
        for id in ids {
            if let Err(err) = cache.delete(id).await {
                warn!("Failed to invalidate embedding for {}: {}", id, err);
            }
        }
    }

    async fn vector_hits(&self, state: &IndexState, query: &str, limit: usize) -> Result<Vec<ScoredId>> {
        let (Some(vectors), Some(provider)) = (state.vector.as_ref(), self.embeddings.as_ref()) else {
            return Err(DiscoveryError::Config(format!(
                "Vector search is unavailable: index was built in '{}' mode",
                self.config.mode
            )));
        };

        let embedding = provider.embed_query(query).await?;
        self.check_dimensions(&embedding)?;

        Ok(vectors
            .search(&embedding, limit)
            .into_iter()
            .map(|hit| ScoredId::new(hit.id, clamp_unit(hit.score)))
            .collect())
    }

    /// Cache first, then one batch call for every miss, then write-back
    async fn compute_embeddings(&self, tools: &[ToolMetadata]) -> Result<HashMap<String, Vec<f32>>> {
        let provider = self.embeddings.as_ref().ok_or_else(|| {
            DiscoveryError::Config("No embedding provider configured".to_string())
        })?;

        let mut vectors = HashMap::with_capacity(tools.len());
        let mut missing: Vec<&ToolMetadata> = Vec::new();

        for tool in tools {
            let cached = match &self.cache {
                Some(cache) => match cache.get(&tool.id).await {
                    Ok(hit) => hit.filter(|vector| self.check_dimensions(vector).is_ok()),
                    Err(err) => {
                        warn!("Embedding cache read failed for {}: {}", tool.id, err);
                        None
                    }
                },
                None => None,
            };

            match cached {
                Some(vector) => {
                    vectors.insert(tool.id.clone(), vector);
                }
                None => missing.push(tool),
            }
        }

        let hits = vectors.len();
        if missing.is_empty() {
            debug!("All {} embeddings served from cache", hits);
            return Ok(vectors);
        }

        let texts: Vec<String> = missing.iter().map(|tool| embedding_text(tool)).collect();
        let computed = provider.embed_documents(&texts).await?;
        if computed.len() != missing.len() {
            return Err(DiscoveryError::Embedding(format!(
                "Provider returned {} vectors for {} documents",
                computed.len(),
                missing.len()
            )));
        }

        for (tool, vector) in missing.into_iter().zip(computed) {
            self.check_dimensions(&vector)?;
            if let Some(cache) = &self.cache {
                if let Err(err) = cache.set(&tool.id, vector.clone()).await {
                    warn!("Embedding cache write failed for {}: {}", tool.id, err);
                }
            }
            vectors.insert(tool.id.clone(), vector);
        }

        add_metric(
            "embedding_cache_hits",
            hits as f64,
            &[("computed", (vectors.len() - hits).to_string())],
        );
        Ok(vectors)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        match self.config.dimensions {
            Some(expected) if expected != vector.len() => Err(DiscoveryError::Embedding(format!(
                "Expected {} dimensions, got {}",
                expected,
                vector.len()
            ))),
            _ => Ok(()),
        }
    }
}

fn keyword_hits(state: &IndexState, query: &str, limit: usize) -> Vec<ScoredId> {
    let raw = state.keyword.search(query, limit);
    let scores: Vec<f64> = raw.iter().map(|hit| hit.score).collect();
    raw.into_iter()
        .zip(min_max_normalize(&scores))
        .map(|(hit, score)| ScoredId::new(hit.id, score))
        .collect()
}

fn embedding_text(tool: &ToolMetadata) -> String {
    format!("{}: {}", tool.name, tool.description)
}

//! # Tool Search
//!
//! Relevance search over tool metadata in three modes:
//!
//! - keyword: boosted BM25 over name, description, keywords and categories,
//!   min-max normalized per result list
//! - vector: nearest neighbors of the query embedding, clamped to [0, 1]
//! - hybrid: both, each asked for twice the limit, fused into one list
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tool_discovery::catalog::ToolMetadata;
//! use tool_discovery::search::{HashingEmbedder, SearchIndex, SearchMode, SearchOptions};
//!
//! # async fn example() -> tool_discovery::error::Result<()> {
//! let index = SearchIndex::builder()
//!     .mode(SearchMode::Hybrid)
//!     .embedding_provider(Arc::new(HashingEmbedder::default()))
//!     .build()?;
//!
//! index
//!     .index(vec![ToolMetadata::new("calculator", "Evaluate arithmetic expressions")])
//!     .await?;
//!
//! let results = index.search("arithmetic", &SearchOptions::with_limit(3)).await?;
//! # Ok(())
//! # }
//! ```

pub mod embedding;
pub mod embedding_cache;
mod index;
pub mod keyword;
pub mod normalize;
mod types;
pub mod vector;

pub use embedding::{cosine_similarity, EmbeddingProvider, HashingEmbedder};
pub use embedding_cache::{
    EmbeddingCache, InMemoryEmbeddingCache, LruEmbeddingCache, MemoryRemoteStore,
    RemoteEmbeddingCache, RemoteStore,
};
pub use index::{
    KeywordIndexFactory, SearchIndex, SearchIndexBuilder, SearchIndexConfig, VectorIndexFactory,
};
pub use keyword::{Bm25Index, FieldBoosts, KeywordDocument, KeywordIndex};
pub use normalize::{FusionStrategy, FusionWeights, ScoredId};
pub use types::{MatchType, SearchMode, SearchOptions, SearchResult, ToolMatch, DEFAULT_SEARCH_LIMIT};
pub use vector::{FlatVectorIndex, VectorIndex};

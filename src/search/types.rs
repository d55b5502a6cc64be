use crate::catalog::ToolMetadata;
use serde::{Deserialize, Serialize};

/// Default number of results returned by a search
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Retrieval mode of the search index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// BM25 keyword matching only
    #[default]
    Keyword,
    /// Embedding nearest-neighbor search only
    Vector,
    /// Keyword and vector results fused into one list
    Hybrid,
}

impl SearchMode {
    /// Returns true if the mode needs an embedding provider
    pub fn requires_embeddings(self) -> bool {
        !matches!(self, SearchMode::Keyword)
    }

    /// Match type tagged onto results of this mode
    pub fn match_type(self) -> MatchType {
        match self {
            SearchMode::Keyword => MatchType::Keyword,
            SearchMode::Vector => MatchType::Vector,
            SearchMode::Hybrid => MatchType::Hybrid,
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchMode::Keyword => write!(f, "keyword"),
            SearchMode::Vector => write!(f, "vector"),
            SearchMode::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Which retrieval path produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Keyword match
    Keyword,
    /// Vector match
    Vector,
    /// Fused keyword and vector match
    Hybrid,
}

/// One ranked hit; scores are normalized to [0, 1] within a result list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matched tool id
    pub tool_id: String,
    /// Normalized relevance, higher is better
    pub score: f64,
    /// Retrieval path that produced the hit
    pub match_type: MatchType,
}

/// A search result together with the indexed metadata of the tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolMatch {
    /// Indexed metadata
    pub metadata: ToolMetadata,
    /// Ranking information
    pub result: SearchResult,
}

/// Per-call search options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Overrides the index's configured mode
    #[serde(default)]
    pub mode: Option<SearchMode>,

    /// Maximum number of results
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Minimum normalized score
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Keep only tools carrying at least one of these categories
    #[serde(default)]
    pub categories: Vec<String>,
}

fn default_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: None,
            limit: DEFAULT_SEARCH_LIMIT,
            threshold: None,
            categories: Vec::new(),
        }
    }
}

impl SearchOptions {
    /// Options with the given limit
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Overrides the mode
    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sets a score floor
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Restricts results to the given categories
    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }
}

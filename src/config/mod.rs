use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::discovery::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::loader::{LoaderConfig, DEFAULT_MAX_SIZE, DEFAULT_TTL};
use crate::search::{
    EmbeddingCache, FieldBoosts, FusionStrategy, FusionWeights, InMemoryEmbeddingCache,
    LruEmbeddingCache, SearchIndexConfig, SearchMode, DEFAULT_SEARCH_LIMIT,
};
use crate::telemetry::TelemetryConfig;

/// Settings for the discovery stack
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Search index settings
    #[serde(default)]
    pub search: SearchSettings,

    /// Embedding cache settings
    #[serde(default)]
    pub embedding_cache: EmbeddingCacheSettings,

    /// Tool loader settings
    #[serde(default)]
    pub loader: LoaderSettings,

    /// Discovery loop settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Logger settings
    #[serde(default)]
    pub logger: LoggerSettings,
}

impl Settings {
    /// Discovery loop options, with the search limit taken from the
    /// `search` section
    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            search_limit: self.search.limit,
            ..self.discovery.clone()
        }
    }
}

/// Settings for the search index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Retrieval mode
    #[serde(default)]
    pub mode: SearchMode,

    /// Number of results per search call of the discovery loop
    #[serde(default = "default_search_limit")]
    pub limit: usize,

    /// Keyword field boosts
    #[serde(default)]
    pub boosts: FieldBoosts,

    /// Hybrid fusion weights
    #[serde(default)]
    pub weights: FusionWeights,

    /// Hybrid fusion strategy
    #[serde(default)]
    pub fusion: FusionStrategy,

    /// Expected embedding size
    pub dimensions: Option<usize>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            limit: DEFAULT_SEARCH_LIMIT,
            boosts: FieldBoosts::default(),
            weights: FusionWeights::default(),
            fusion: FusionStrategy::default(),
            dimensions: None,
        }
    }
}

impl SearchSettings {
    /// Index options described by these settings
    pub fn index_config(&self) -> SearchIndexConfig {
        SearchIndexConfig {
            mode: self.mode,
            boosts: self.boosts,
            weights: self.weights,
            fusion: self.fusion,
            dimensions: self.dimensions,
        }
    }
}

/// Embedding cache backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Unbounded in-memory map
    #[default]
    Memory,
    /// Size-bounded LRU
    Lru,
    /// No caching
    None,
}

/// Settings for the embedding cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingCacheSettings {
    /// Backend
    #[serde(default)]
    pub backend: CacheBackend,

    /// Capacity of the LRU backend
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for EmbeddingCacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            capacity: default_cache_capacity(),
        }
    }
}

impl EmbeddingCacheSettings {
    /// Builds the configured cache, if any
    pub fn build(&self) -> Option<Arc<dyn EmbeddingCache>> {
        match self.backend {
            CacheBackend::Memory => Some(Arc::new(InMemoryEmbeddingCache::new())),
            CacheBackend::Lru => Some(Arc::new(LruEmbeddingCache::new(self.capacity))),
            CacheBackend::None => None,
        }
    }
}

/// Settings for the tool loader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderSettings {
    /// Maximum number of cached handles
    #[serde(default = "default_loader_size")]
    pub max_size: usize,

    /// Handle lifetime in seconds; 0 disables expiry
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            max_size: default_loader_size(),
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

impl LoaderSettings {
    /// Loader options described by these settings
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            max_size: self.max_size,
            ttl: (self.ttl_seconds > 0).then(|| Duration::from_secs(self.ttl_seconds)),
        }
    }
}

/// Logger settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Colored console output
    #[serde(default = "default_true")]
    pub console: bool,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: true,
        }
    }
}

impl LoggerSettings {
    /// Telemetry options described by these settings
    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            enable_console: self.console,
            log_level: self.level.clone(),
            ..TelemetryConfig::default()
        }
    }
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn default_cache_capacity() -> usize {
    1_000
}

fn default_loader_size() -> usize {
    DEFAULT_MAX_SIZE
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL.as_secs()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Default locations searched by [`get_settings`]
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = [
    "tool_discovery.config.yaml",
    "config/tool_discovery.config.yaml",
];

/// Parses settings from YAML text
pub fn parse_settings(contents: &str) -> Result<Settings> {
    serde_yaml::from_str(contents)
        .map_err(|e| DiscoveryError::Config(format!("Failed to parse config file: {}", e)))
}

/// Load settings from a YAML file
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let mut file = File::open(path)
        .map_err(|e| DiscoveryError::Config(format!("Failed to open config file: {}", e)))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| DiscoveryError::Config(format!("Failed to read config file: {}", e)))?;

    parse_settings(&contents)
}

/// Get settings, optionally from a specific file.
///
/// Without a path the default locations are tried in order, falling back to
/// defaults when none exists.
pub fn get_settings(config_path: Option<&str>) -> Result<Settings> {
    match config_path {
        Some(path) => load_settings(path),
        None => {
            for path in DEFAULT_CONFIG_PATHS {
                if Path::new(path).exists() {
                    return load_settings(path);
                }
            }

            Ok(Settings::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_defaults() {
        let settings = parse_settings("{}").unwrap();
        assert_eq!(settings.search.mode, SearchMode::Keyword);
        assert_eq!(settings.search.limit, 5);
        assert_eq!(settings.loader.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(settings.discovery.max_iterations, 25);
        assert_eq!(settings.discovery.search_tool_name, "search_tools");
        assert_eq!(settings.logger.level, "info");
        assert_eq!(settings.discovery_config().search_limit, DEFAULT_SEARCH_LIMIT);
    }

    #[test]
    fn test_parse_full_document() {
        let yaml = r#"
search:
  mode: hybrid
  limit: 8
  boosts:
    name: 4.0
  weights:
    keyword: 0.3
    vector: 0.7
  fusion:
    type: reciprocal_rank
    k: 30
  dimensions: 384
embedding_cache:
  backend: lru
  capacity: 50
loader:
  max_size: 10
  ttl_seconds: 0
discovery:
  system_prompt: "Search for tools first."
  max_iterations: 12
logger:
  level: debug
"#;
        let settings = parse_settings(yaml).unwrap();

        let index = settings.search.index_config();
        assert_eq!(index.mode, SearchMode::Hybrid);
        assert_eq!(index.boosts.name, 4.0);
        assert_eq!(index.boosts.keywords, 2.0);
        assert_eq!(index.weights.vector, 0.7);
        assert_eq!(index.fusion, FusionStrategy::ReciprocalRank { k: 30.0 });
        assert_eq!(index.dimensions, Some(384));

        assert_eq!(settings.embedding_cache.backend, CacheBackend::Lru);
        assert!(settings.embedding_cache.build().is_some());

        let loader = settings.loader.loader_config();
        assert_eq!(loader.max_size, 10);
        assert_eq!(loader.ttl, None);

        assert_eq!(
            settings.discovery.system_prompt.as_deref(),
            Some("Search for tools first.")
        );
        let discovery = settings.discovery_config();
        assert_eq!(discovery.search_limit, 8);
        assert_eq!(discovery.max_iterations, 12);
        assert_eq!(settings.logger.telemetry_config().log_level, "debug");
    }

    #[test]
    fn test_invalid_yaml_is_a_config_error() {
        let err = parse_settings("search: [unclosed").unwrap_err();
        assert!(matches!(err, DiscoveryError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let err = load_settings("/nonexistent/tool_discovery.config.yaml").unwrap_err();
        assert!(matches!(err, DiscoveryError::Config(_)));
    }
}

//! Error types for tool discovery
//!
//! Configuration errors surface at construction time. Lookup failures are
//! split into distinct variants so callers can tell a typo (`ToolNotFound`)
//! from a registration bug (`SourceNotFound`) and from catalog/provider drift
//! (`HandleUnavailable`).

use thiserror::Error;

/// A specialized Result type for tool discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Represents errors that can occur while indexing, loading or running tools.
///
/// The type is `Clone` so that one failed load can be handed to every caller
/// waiting on the same in-flight request.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// Invalid construction-time configuration
    #[error("Config error: {0}")]
    Config(String),

    /// The catalog holds no metadata for this tool id
    #[error("Tool not found: {id}")]
    ToolNotFound {
        /// Requested tool id
        id: String,
    },

    /// The tool's metadata names a provider that was never registered
    #[error("Source '{source_id}' for tool '{tool_id}' is not registered")]
    SourceNotFound {
        /// Requested tool id
        tool_id: String,
        /// Provider id named by the metadata
        source_id: String,
    },

    /// The provider returned no handle for a tool the catalog still lists
    #[error("Tool '{id}' is listed in the catalog but source '{source_id}' returned no handle")]
    HandleUnavailable {
        /// Requested tool id
        id: String,
        /// Provider that was asked for the handle
        source_id: String,
    },

    /// `search` was called before `index`
    #[error("Search index is not initialized, call index() first")]
    NotInitialized,

    /// `reindex` was called before any `index`
    #[error("Nothing to reindex, call index() first")]
    NothingToReindex,

    /// The embedding provider failed or returned malformed vectors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// A tool provider failed while listing or materializing tools
    #[error("Provider error: {0}")]
    Provider(String),

    /// A tool invocation failed
    #[error("Execution error: {0}")]
    Execution(String),

    /// The chat model failed
    #[error("Model error: {0}")]
    Model(String),

    /// The discovery loop ran more node steps than allowed
    #[error("Discovery loop exceeded {0} steps without finishing")]
    IterationLimit(usize),

    /// JSON or YAML (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error, typically while reading configuration
    #[error("IO error: {0}")]
    Io(String),
}

impl DiscoveryError {
    /// Returns true for the three lookup failures of a tool load.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DiscoveryError::ToolNotFound { .. }
                | DiscoveryError::SourceNotFound { .. }
                | DiscoveryError::HandleUnavailable { .. }
        )
    }
}

impl From<std::io::Error> for DiscoveryError {
    fn from(err: std::io::Error) -> Self {
        DiscoveryError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DiscoveryError {
    fn from(err: serde_json::Error) -> Self {
        DiscoveryError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for DiscoveryError {
    fn from(err: serde_yaml::Error) -> Self {
        DiscoveryError::Serialization(err.to_string())
    }
}

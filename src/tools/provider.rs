use crate::catalog::ToolMetadata;
use crate::error::{DiscoveryError, Result};
use crate::tools::handle::{FnTool, SharedTool};
use crate::tools::models::ToolDefinition;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

/// A source of tools: lists metadata and materializes handles on demand.
///
/// Providers may live in memory, behind a subprocess or across the network;
/// the catalog and loader treat them uniformly.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Unique provider id, used as the namespace of its tool ids
    fn id(&self) -> &str;

    /// Kind of provider, recorded as the `source` of its tools
    fn kind(&self) -> &str {
        "custom"
    }

    /// Full current listing of the provider's tools
    async fn get_metadata(&self) -> Result<Vec<ToolMetadata>>;

    /// Materializes the tool with the given provider-local name, or `None`
    async fn get_tool(&self, name: &str) -> Result<Option<SharedTool>>;

    /// Stream of fresh listings when the provider's tools change out-of-band
    fn refresh_events(&self) -> Option<broadcast::Receiver<Vec<ToolMetadata>>> {
        None
    }
}

struct RegisteredTool {
    metadata: ToolMetadata,
    handle: SharedTool,
}

/// Provider holding tool handles in memory
pub struct InMemoryToolProvider {
    id: String,

    /// Map of tools by name
    tools: RwLock<BTreeMap<String, RegisteredTool>>,

    refresh_tx: broadcast::Sender<Vec<ToolMetadata>>,
}

impl fmt::Debug for InMemoryToolProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.tools.read().map(|tools| tools.len()).unwrap_or(0);
        f.debug_struct("InMemoryToolProvider")
            .field("id", &self.id)
            .field("tools_count", &count)
            .finish_non_exhaustive()
    }
}

impl InMemoryToolProvider {
    /// Creates an empty provider
    pub fn new(id: impl Into<String>) -> Self {
        let (refresh_tx, _) = broadcast::channel(16);
        Self {
            id: id.into(),
            tools: RwLock::new(BTreeMap::new()),
            refresh_tx,
        }
    }

    /// Creates a provider pre-populated with handles
    pub fn with_tools(id: impl Into<String>, tools: Vec<SharedTool>) -> Result<Self> {
        let provider = Self::new(id);
        for tool in tools {
            provider.register_tool(tool)?;
        }
        Ok(provider)
    }

    /// Registers a handle, deriving its metadata from the definition
    pub fn register_tool(&self, handle: SharedTool) -> Result<()> {
        let metadata = ToolMetadata::from_definition(handle.definition());
        self.register_with_metadata(metadata, handle)
    }

    /// Registers a handle with explicit metadata (categories, keywords)
    pub fn register_with_metadata(&self, metadata: ToolMetadata, handle: SharedTool) -> Result<()> {
        let mut tools = self
            .tools
            .write()
            .map_err(|_| DiscoveryError::Provider("Failed to acquire tools lock".to_string()))?;

        debug!(provider = %self.id, tool = %metadata.name, "Registering tool");
        tools.insert(metadata.name.clone(), RegisteredTool { metadata, handle });
        Ok(())
    }

    /// Registers a synchronous closure as a tool
    pub fn register_fn<F>(&self, definition: ToolDefinition, handler: F) -> Result<()>
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.register_tool(Arc::new(FnTool::sync(definition, handler)))
    }

    /// Unregisters a tool, returning whether it existed
    pub fn unregister_tool(&self, name: &str) -> Result<bool> {
        let mut tools = self
            .tools
            .write()
            .map_err(|_| DiscoveryError::Provider("Failed to acquire tools lock".to_string()))?;

        Ok(tools.remove(name).is_some())
    }

    /// Publishes the current listing to refresh subscribers.
    ///
    /// Returns the number of subscribers that received it.
    pub fn notify_refresh(&self) -> Result<usize> {
        let listing = self.listing()?;
        Ok(self.refresh_tx.send(listing).unwrap_or(0))
    }

    fn listing(&self) -> Result<Vec<ToolMetadata>> {
        let tools = self
            .tools
            .read()
            .map_err(|_| DiscoveryError::Provider("Failed to acquire tools lock".to_string()))?;

        Ok(tools.values().map(|tool| tool.metadata.clone()).collect())
    }
}

#[async_trait]
impl ToolProvider for InMemoryToolProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        "memory"
    }

    async fn get_metadata(&self) -> Result<Vec<ToolMetadata>> {
        self.listing()
    }

    async fn get_tool(&self, name: &str) -> Result<Option<SharedTool>> {
        let tools = self
            .tools
            .read()
            .map_err(|_| DiscoveryError::Provider("Failed to acquire tools lock".to_string()))?;

        Ok(tools.get(name).map(|tool| Arc::clone(&tool.handle)))
    }

    fn refresh_events(&self) -> Option<broadcast::Receiver<Vec<ToolMetadata>>> {
        Some(self.refresh_tx.subscribe())
    }
}

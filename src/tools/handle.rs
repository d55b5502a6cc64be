use crate::error::Result;
use crate::tools::models::ToolDefinition;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// The live, invocable form of a tool
#[async_trait]
pub trait ToolHandle: Send + Sync + fmt::Debug {
    /// Definition used when binding the tool to a model
    fn definition(&self) -> &ToolDefinition;

    /// Invokes the tool with JSON arguments
    async fn invoke(&self, arguments: Value) -> Result<Value>;
}

/// Shared pointer to a tool handle
pub type SharedTool = Arc<dyn ToolHandle>;

/// Type for asynchronous tool functions
pub type ToolFunction = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A tool handle backed by a closure
#[derive(Clone)]
pub struct FnTool {
    definition: ToolDefinition,
    function: ToolFunction,
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.definition.name)
            .finish_non_exhaustive()
    }
}

impl FnTool {
    /// Creates a tool from an async closure
    pub fn new<F, Fut>(definition: ToolDefinition, function: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            definition,
            function: Arc::new(move |args| function(args).boxed()),
        }
    }

    /// Creates a tool from a synchronous closure
    pub fn sync<F>(definition: ToolDefinition, function: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        let function = Arc::new(function);
        Self::new(definition, move |args| {
            let function = Arc::clone(&function);
            async move { function(args) }
        })
    }

    /// Wraps the tool in an `Arc<dyn ToolHandle>`
    pub fn shared(self) -> SharedTool {
        Arc::new(self)
    }
}

#[async_trait]
impl ToolHandle for FnTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        (self.function)(arguments).await
    }
}

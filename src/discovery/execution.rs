use crate::error::{DiscoveryError, Result};
use crate::llm::ToolCall;
use crate::tools::SharedTool;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Runs one tool invocation for the act node.
///
/// Wrap the direct call to add durability, retries or timeouts without the
/// loop knowing about it.
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    /// Invokes `tool` with the call's arguments
    async fn execute(&self, tool: SharedTool, call: &ToolCall) -> Result<Value>;
}

/// Invokes the tool directly
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectExecution;

#[async_trait]
impl ExecutionStrategy for DirectExecution {
    async fn execute(&self, tool: SharedTool, call: &ToolCall) -> Result<Value> {
        tool.invoke(call.arguments.clone()).await
    }
}

/// Fails invocations that run longer than a deadline
#[derive(Debug, Clone, Copy)]
pub struct TimeoutExecution<S = DirectExecution> {
    inner: S,
    timeout: Duration,
}

impl TimeoutExecution {
    /// Direct execution bounded by `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self::wrap(DirectExecution, timeout)
    }
}

impl<S: ExecutionStrategy> TimeoutExecution<S> {
    /// Bounds another strategy by `timeout`
    pub fn wrap(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<S: ExecutionStrategy> ExecutionStrategy for TimeoutExecution<S> {
    async fn execute(&self, tool: SharedTool, call: &ToolCall) -> Result<Value> {
        match tokio::time::timeout(self.timeout, self.inner.execute(tool, call)).await {
            Ok(result) => result,
            Err(_) => Err(DiscoveryError::Execution(format!(
                "Tool '{}' timed out after {:?}",
                call.name, self.timeout
            ))),
        }
    }
}

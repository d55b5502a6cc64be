#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::invalid_codeblock_attributes)]

//! Tool-Discovery lets an LLM agent work with a large tool catalog without
//! binding every tool to the model. Tools are indexed for keyword, vector or
//! hybrid search, materialized lazily through a deduplicating cache, and
//! driven by a small decide/search/act loop in which the model searches for
//! the tools it needs before calling them.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tool_discovery::context::{ContextOptions, DiscoveryContext, ToolSet};
//! use tool_discovery::discovery::DiscoveryConfig;
//! use tool_discovery::llm::{Message, ScriptedModel};
//! use tool_discovery::tools::{FnTool, ToolDefinition};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let calculator = FnTool::sync(
//!         ToolDefinition::without_parameters("calculator", "Add two numbers"),
//!         |args| Ok(json!(args["a"].as_f64().unwrap_or(0.0) + args["b"].as_f64().unwrap_or(0.0))),
//!     )
//!     .shared();
//!
//!     // Register, index and wire up the tools
//!     let context = DiscoveryContext::build(
//!         ToolSet::Tools(vec![calculator]),
//!         ContextOptions::default(),
//!     )
//!     .await?;
//!
//!     // Any ChatModel works here; the scripted one replays canned replies
//!     let model = Arc::new(ScriptedModel::new([Message::assistant("Hello!")]));
//!     let agent = context.agent(model, DiscoveryConfig::default())?;
//!
//!     let state = agent.invoke("What is 2 + 3?").await?;
//!     println!("{} messages", state.messages.len());
//!
//!     context.dispose();
//!     Ok(())
//! }
//! ```

/// Tool catalog aggregating provider listings under namespaced ids
pub mod catalog;

/// Configuration management
pub mod config;

/// Explicit wiring of catalog, index and loader
pub mod context;

/// Decide/search/act agent loop
pub mod discovery;

/// Error types for tool discovery
pub mod error;

/// Chat model boundary
pub mod llm;

/// Lazy tool handle cache
pub mod loader;

/// Keyword, vector and hybrid tool search
pub mod search;

/// Logging and metrics
pub mod telemetry;

/// Tool definitions, handles and providers
pub mod tools;

// Re-export error types
pub use error::{DiscoveryError, Result};

/// Re-export telemetry types and functions for easier access
pub use telemetry::{add_metric, add_metrics, init_telemetry, span_duration, TelemetryConfig};

/// Re-export the main entry points
pub use catalog::{ToolCatalog, ToolMetadata};
pub use context::{ContextOptions, DiscoveryContext, ToolSet};
pub use discovery::{DiscoveryAgent, DiscoveryConfig, DiscoveryState};
pub use loader::{LoaderConfig, ToolLoader};
pub use search::{SearchIndex, SearchMode, SearchOptions, SearchResult};

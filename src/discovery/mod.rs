//! # Discovery Loop
//!
//! A three-node state machine: `decide` asks the model what to do with the
//! search tool, pinned tools and every discovered tool bound; `search` runs
//! the model's search calls through the [`SearchIndex`](crate::search::SearchIndex)
//! and records what was found; `act` executes the model's tool calls through
//! the [`ToolLoader`](crate::loader::ToolLoader). Both return to `decide`,
//! and the loop ends when the model replies without tool calls.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tool_discovery::discovery::{DiscoveryAgent, DiscoveryConfig};
//! use tool_discovery::llm::{Message, ScriptedModel};
//! # use tool_discovery::loader::ToolLoader;
//! # use tool_discovery::search::SearchIndex;
//!
//! # async fn example(index: Arc<SearchIndex>, loader: Arc<ToolLoader>) -> tool_discovery::error::Result<()> {
//! let model = Arc::new(ScriptedModel::new([Message::assistant("Nothing to do.")]));
//! let agent = DiscoveryAgent::new(model, index, loader, DiscoveryConfig::default())?;
//!
//! let state = agent.invoke("What is 2 + 2?").await?;
//! assert_eq!(state.messages.len(), 2);
//! # Ok(())
//! # }
//! ```

mod engine;
mod execution;
mod router;
mod search_tool;
mod state;
mod tests;

pub use engine::{DiscoveryAgent, DiscoveryConfig, DEFAULT_MAX_ITERATIONS};
pub use execution::{DirectExecution, ExecutionStrategy, TimeoutExecution};
pub use router::{route, Route};
pub use search_tool::{extract_query, format_matches, search_tool_definition, SEARCH_TOOL_NAME};
pub use state::{DiscoveryState, SearchRecord, StateUpdate};

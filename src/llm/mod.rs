//! Language model boundary of the discovery loop.
//!
//! The loop only needs a model that can be bound to tools and returns either
//! plain content or a list of tool calls; adapters for real providers
//! implement [`ChatModel`].

mod model;
/// Message types shared with model adapters
pub mod types;

pub use model::{ChatModel, ModelCall, ScriptedModel};
pub use types::{Message, MessageRole, ToolCall};

//! # Tools
//!
//! Tool definitions, invocable handles and the provider interface through
//! which the catalog lists tools and the loader materializes them.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tool_discovery::tools::{InMemoryToolProvider, ToolDefinition};
//! use serde_json::json;
//!
//! let provider = InMemoryToolProvider::new("math");
//!
//! let tool = ToolDefinition::new(
//!     "add",
//!     "Add two numbers",
//!     json!({
//!         "type": "object",
//!         "properties": {
//!             "a": { "type": "number" },
//!             "b": { "type": "number" }
//!         },
//!         "required": ["a", "b"]
//!     }),
//! );
//!
//! provider.register_fn(tool, |args| {
//!     let a = args["a"].as_f64().unwrap_or_default();
//!     let b = args["b"].as_f64().unwrap_or_default();
//!     Ok(json!(a + b))
//! }).unwrap();
//! ```

mod handle;
mod models;
mod provider;
mod tests;

// Re-export the public API
pub use handle::{FnTool, SharedTool, ToolFunction, ToolHandle};
pub use models::{result_to_text, ToolDefinition};
pub use provider::{InMemoryToolProvider, ToolProvider};

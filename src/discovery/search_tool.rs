//! The `search_tools` meta-tool the model calls to discover more tools.

use crate::llm::ToolCall;
use crate::search::ToolMatch;
use crate::tools::ToolDefinition;
use serde_json::{json, Value};

/// Default name of the search meta-tool
pub const SEARCH_TOOL_NAME: &str = "search_tools";

/// Definition bound to the model on every turn
pub fn search_tool_definition(name: &str) -> ToolDefinition {
    ToolDefinition::new(
        name,
        "Search for tools that can help with the current task. Call this when none of the \
         available tools fit; matching tools become callable on the next turn.",
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Natural-language description of the capability you need"
                }
            },
            "required": ["query"]
        }),
    )
}

/// Query text of a search call; a bare string argument is accepted as the query
pub fn extract_query(call: &ToolCall) -> String {
    match &call.arguments {
        Value::String(query) => query.trim().to_string(),
        arguments => arguments
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string(),
    }
}

/// Reply shown to the model for one search
pub fn format_matches(query: &str, matches: &[ToolMatch]) -> String {
    if matches.is_empty() {
        return format!("No tools found matching \"{}\".", query);
    }

    let listing = matches
        .iter()
        .map(|hit| format!("- {}: {}", hit.metadata.name, hit.metadata.description))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Found {} tools:\n{}", matches.len(), listing)
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Definition of a tool as it is bound to a chat model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Name the model uses to request the tool
    pub name: String,

    /// Human-readable description of functionality
    pub description: String,

    /// JSON Schema defining expected parameters
    pub input_schema: Value,

    /// Optional properties describing tool behavior
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<HashMap<String, Value>>,
}

impl ToolDefinition {
    /// Creates a new tool definition with the given name, description, and input schema
    pub fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            annotations: None,
        }
    }

    /// Creates a definition that accepts an empty argument object
    pub fn without_parameters(name: &str, description: &str) -> Self {
        Self::new(
            name,
            description,
            serde_json::json!({ "type": "object", "properties": {} }),
        )
    }

    /// Adds an annotation to the tool
    pub fn with_annotation(mut self, key: &str, value: Value) -> Self {
        let annotations = self.annotations.get_or_insert_with(HashMap::new);
        annotations.insert(key.to_string(), value);
        self
    }
}

/// Renders a tool result as the text handed back to the model.
///
/// Strings are passed through untouched, everything else is serialized as JSON.
pub fn result_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

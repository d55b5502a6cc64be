use crate::tools::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Describes one discoverable tool, independent of its implementation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Globally unique id, namespaced by provider (`"provider:name"`)
    pub id: String,

    /// Short name, unique only within its provider
    pub name: String,

    /// Natural-language description, the main search signal
    pub description: String,

    /// JSON-Schema-shaped invocation arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,

    /// Category labels, used for filtering and as a secondary search signal
    #[serde(default)]
    pub categories: Vec<String>,

    /// Extra search keywords
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Kind of provider that produced this entry
    #[serde(default)]
    pub source: String,

    /// Id of the provider that produced this entry
    #[serde(default)]
    pub source_id: String,
}

impl ToolMetadata {
    /// Creates metadata with an id equal to the name
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            description: description.into(),
            ..Default::default()
        }
    }

    /// Derives metadata from a tool definition
    pub fn from_definition(definition: &ToolDefinition) -> Self {
        Self::new(&definition.name, &definition.description)
            .with_parameters(definition.input_schema.clone())
    }

    /// Sets an explicit id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the parameter schema
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Sets the categories
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the keywords
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if the tool carries any of the given categories
    pub fn has_any_category(&self, categories: &[String]) -> bool {
        self.categories
            .iter()
            .any(|own| categories.iter().any(|wanted| own.eq_ignore_ascii_case(wanted)))
    }
}

/// Builds the catalog id of a provider's tool
pub fn namespaced_id(source_id: &str, name: &str) -> String {
    format!("{}:{}", source_id, name)
}

/// Diff emitted whenever the catalog changes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogChange {
    /// Ids that appeared
    pub added: Vec<String>,

    /// Ids that disappeared
    pub removed: Vec<String>,
}

impl CatalogChange {
    /// Returns true if nothing was added or removed
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

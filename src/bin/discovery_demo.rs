//! Discovery demo runs the search/act loop over a small tool catalog
//!
//! This example shows how to:
//! 1. Load settings and initialize telemetry
//! 2. Register two tool providers and index them for hybrid search
//! 3. Drive the discovery loop with a scripted model
//! 4. Inspect the resulting conversation and search history

use anyhow::{anyhow, Context, Result};
use serde_json::json;
use std::sync::Arc;
use tool_discovery::config::get_settings;
use tool_discovery::context::{ContextOptions, DiscoveryContext, ToolSet};
use tool_discovery::llm::{Message, ScriptedModel, ToolCall};
use tool_discovery::search::{HashingEmbedder, SearchMode};
use tool_discovery::telemetry::init_telemetry;
use tool_discovery::tools::{InMemoryToolProvider, ToolDefinition, ToolProvider};
use tracing::info;

fn math_provider() -> Result<Arc<dyn ToolProvider>> {
    let provider = InMemoryToolProvider::new("math");

    provider.register_fn(
        ToolDefinition::new(
            "add",
            "Add two numbers",
            json!({
                "type": "object",
                "properties": { "a": { "type": "number" }, "b": { "type": "number" } },
                "required": ["a", "b"]
            }),
        ),
        |args| {
            let a = args["a"].as_f64().unwrap_or_default();
            let b = args["b"].as_f64().unwrap_or_default();
            Ok(json!(a + b))
        },
    )?;

    provider.register_fn(
        ToolDefinition::new(
            "celsius_to_fahrenheit",
            "Convert a temperature from Celsius to Fahrenheit",
            json!({
                "type": "object",
                "properties": { "celsius": { "type": "number" } },
                "required": ["celsius"]
            }),
        ),
        |args| {
            let celsius = args["celsius"].as_f64().unwrap_or_default();
            Ok(json!(celsius * 9.0 / 5.0 + 32.0))
        },
    )?;

    Ok(Arc::new(provider))
}

fn office_provider() -> Result<Arc<dyn ToolProvider>> {
    let provider = InMemoryToolProvider::new("office");

    provider.register_fn(
        ToolDefinition::without_parameters("weather", "Get the weather forecast for today"),
        |_| Ok(json!("Sunny, 21 degrees Celsius")),
    )?;

    provider.register_fn(
        ToolDefinition::new(
            "send_email",
            "Send an email message to a recipient",
            json!({
                "type": "object",
                "properties": {
                    "to": { "type": "string" },
                    "body": { "type": "string" }
                },
                "required": ["to", "body"]
            }),
        ),
        |args| Ok(json!(format!("Email queued for {}", args["to"].as_str().unwrap_or("?")))),
    )?;

    Ok(Arc::new(provider))
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = get_settings(None).context("Failed to load settings")?;
    init_telemetry(settings.logger.telemetry_config()).map_err(|e| anyhow!(e))?;

    let mut search = settings.search.index_config();
    search.mode = SearchMode::Hybrid;

    let options = ContextOptions {
        search,
        embedding_provider: Some(Arc::new(HashingEmbedder::default())),
        embedding_cache: settings.embedding_cache.build(),
        loader: settings.loader.loader_config(),
    };

    let providers: Vec<Arc<dyn ToolProvider>> = vec![math_provider()?, office_provider()?];
    let context = DiscoveryContext::build(ToolSet::Providers(providers), options).await?;
    info!("Indexed {} tools", context.index().count().await);

    // The scripted model searches, converts the temperature, then answers
    let model = Arc::new(ScriptedModel::new([
        Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::new(
                "call-1",
                "search_tools",
                json!({ "query": "convert temperature celsius" }),
            )],
        ),
        Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::new(
                "call-2",
                "celsius_to_fahrenheit",
                json!({ "celsius": 21 }),
            )],
        ),
        Message::assistant("21 degrees Celsius is 69.8 degrees Fahrenheit."),
    ]));

    let agent = context.agent(model, settings.discovery_config())?;
    let state = agent
        .invoke("What is 21 degrees Celsius in Fahrenheit?")
        .await?;

    println!("Conversation:");
    for message in &state.messages {
        println!("  [{}] {}", message.role, message.content);
        for call in &message.tool_calls {
            println!("      -> {}({})", call.name, call.arguments);
        }
    }

    println!("Searches:");
    for record in &state.search_history {
        println!("  {:?} -> {:?}", record.query, record.result_ids);
    }
    println!("Selected tools: {:?}", state.selected_tool_ids);
    println!("Loader stats: {:?}", context.loader().stats());

    context.dispose();
    Ok(())
}

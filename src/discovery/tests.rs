#[cfg(test)]
mod tests {
    use crate::catalog::{ToolCatalog, ToolMetadata};
    use crate::discovery::{DiscoveryAgent, DiscoveryConfig, DiscoveryState, Route, SEARCH_TOOL_NAME};
    use crate::error::DiscoveryError;
    use crate::llm::{Message, MessageRole, ScriptedModel, ToolCall};
    use crate::loader::{LoaderConfig, ToolLoader};
    use crate::search::SearchIndex;
    use crate::tools::{FnTool, InMemoryToolProvider, ToolDefinition};
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        index: Arc<SearchIndex>,
        loader: Arc<ToolLoader>,
    }

    async fn fixture() -> Fixture {
        let provider = Arc::new(InMemoryToolProvider::new("local"));
        provider
            .register_fn(
                ToolDefinition::new(
                    "calculator",
                    "Add two numbers together",
                    json!({
                        "type": "object",
                        "properties": {
                            "a": { "type": "number" },
                            "b": { "type": "number" }
                        }
                    }),
                ),
                |args| {
                    let a = args["a"].as_f64().unwrap_or_default();
                    let b = args["b"].as_f64().unwrap_or_default();
                    Ok(json!(a + b))
                },
            )
            .unwrap();
        provider
            .register_fn(
                ToolDefinition::without_parameters("weather", "Get the weather forecast"),
                |_| Ok(json!("sunny")),
            )
            .unwrap();

        let catalog = ToolCatalog::new();
        catalog.register_provider(provider).await.unwrap();

        let index = Arc::new(SearchIndex::keyword());
        index.index(catalog.all_metadata()).await.unwrap();
        let loader = Arc::new(ToolLoader::new(
            Arc::clone(&catalog),
            catalog.providers(),
            LoaderConfig::default(),
        ));

        Fixture { index, loader }
    }

    fn search_call(id: &str, query: &str) -> ToolCall {
        ToolCall::new(id, SEARCH_TOOL_NAME, json!({ "query": query }))
    }

    fn agent(fixture: &Fixture, model: Arc<ScriptedModel>, config: DiscoveryConfig) -> DiscoveryAgent {
        DiscoveryAgent::new(
            model,
            Arc::clone(&fixture.index),
            Arc::clone(&fixture.loader),
            config,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_model_without_tool_calling_is_rejected() {
        let fixture = fixture().await;
        let model = Arc::new(ScriptedModel::without_tool_calling(Vec::<Message>::new()));
        let err = DiscoveryAgent::new(
            model,
            Arc::clone(&fixture.index),
            Arc::clone(&fixture.loader),
            DiscoveryConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DiscoveryError::Config(_)));
    }

    #[tokio::test]
    async fn test_plain_reply_ends_immediately() {
        let fixture = fixture().await;
        let model = Arc::new(ScriptedModel::new([Message::assistant("Hello!")]));
        let agent = agent(&fixture, Arc::clone(&model), DiscoveryConfig::default());

        let state = agent.invoke("hi").await.unwrap();

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].role, MessageRole::User);
        assert_eq!(state.messages[1].content, "Hello!");
        assert!(state.selected_tool_ids.is_empty());
        assert!(state.search_history.is_empty());
        assert_eq!(model.calls()[0].tool_names, vec![SEARCH_TOOL_NAME.to_string()]);
    }

    #[tokio::test]
    async fn test_search_accumulates_selection_and_history() {
        let index = Arc::new(SearchIndex::keyword());
        index
            .index(vec![
                ToolMetadata::new("calculator", "Evaluate arithmetic expressions")
                    .with_keywords(["math"]),
                ToolMetadata::new("weather", "Current weather forecast"),
            ])
            .await
            .unwrap();
        let fixture = Fixture {
            index,
            loader: fixture().await.loader,
        };
        let agent = agent(&fixture, Arc::new(ScriptedModel::new(Vec::<Message>::new())), DiscoveryConfig::default());

        let mut state = DiscoveryState::new(vec![Message::assistant_with_tool_calls(
            "",
            vec![search_call("s1", "math")],
        )]);
        let update = agent.search_node(&state).await.unwrap();
        state.apply(update);

        assert_eq!(state.selected_tool_ids, vec!["calculator"]);
        assert_eq!(state.search_history.len(), 1);
        assert_eq!(state.search_history[0].query, "math");

        state.apply(crate::discovery::StateUpdate::messages(vec![
            Message::assistant_with_tool_calls("", vec![search_call("s2", "weather")]),
        ]));
        let update = agent.search_node(&state).await.unwrap();
        state.apply(update);

        assert_eq!(state.selected_tool_ids.len(), 2);
        assert!(state.selected_tool_ids.contains(&"calculator".to_string()));
        assert!(state.selected_tool_ids.contains(&"weather".to_string()));
        assert_eq!(state.search_history.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_search_still_recorded() {
        let fixture = fixture().await;
        let agent = agent(&fixture, Arc::new(ScriptedModel::new(Vec::<Message>::new())), DiscoveryConfig::default());

        let state = DiscoveryState::new(vec![Message::assistant_with_tool_calls(
            "",
            vec![search_call("s1", "spaceship telemetry")],
        )]);
        let update = agent.search_node(&state).await.unwrap();

        assert!(update.selected_tool_ids.is_empty());
        assert_eq!(update.search_history.len(), 1);
        assert!(update.search_history[0].result_ids.is_empty());
        assert_eq!(update.messages[0].tool_call_id.as_deref(), Some("s1"));
        assert!(update.messages[0].content.starts_with("No tools found"));
    }

    #[tokio::test]
    async fn test_search_then_act_end_to_end() {
        let fixture = fixture().await;
        let model = Arc::new(ScriptedModel::new([
            Message::assistant_with_tool_calls("", vec![search_call("c1", "add numbers")]),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCall::new("c2", "calculator", json!({ "a": 2, "b": 3 }))],
            ),
            Message::assistant("The answer is 5"),
        ]));
        let agent = agent(&fixture, Arc::clone(&model), DiscoveryConfig::default());

        let state = agent.invoke("What is 2 + 3?").await.unwrap();

        assert_eq!(state.selected_tool_ids, vec!["local:calculator"]);
        assert_eq!(state.messages.len(), 6);
        assert!(state.messages[2].content.contains("- calculator: Add two numbers together"));
        assert_eq!(state.messages[4].tool_call_id.as_deref(), Some("c2"));
        assert_eq!(state.messages[4].content, "5.0");
        assert_eq!(state.messages[5].content, "The answer is 5");

        let calls = model.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[1].tool_names,
            vec![SEARCH_TOOL_NAME.to_string(), "calculator".to_string()]
        );
    }

    #[tokio::test]
    async fn test_search_defers_concrete_calls() {
        let fixture = fixture().await;
        let model = Arc::new(ScriptedModel::new([
            Message::assistant_with_tool_calls(
                "",
                vec![
                    ToolCall::new("c1", "weather", json!({})),
                    search_call("c2", "weather forecast"),
                ],
            ),
            Message::assistant("Let me check again."),
        ]));
        let agent = agent(&fixture, model, DiscoveryConfig::default());

        let state = agent.invoke("Weather?").await.unwrap();

        assert_eq!(state.messages.len(), 4);
        assert!(state
            .messages
            .iter()
            .all(|message| message.tool_call_id.as_deref() != Some("c1")));
        assert_eq!(state.selected_tool_ids, vec!["local:weather"]);
    }

    #[tokio::test]
    async fn test_act_reports_failures_as_messages() {
        let fixture = fixture().await;
        let broken = FnTool::sync(ToolDefinition::without_parameters("broken", "Always fails"), |_| {
            Err(DiscoveryError::Execution("disk on fire".to_string()))
        })
        .shared();
        let agent = agent(&fixture, Arc::new(ScriptedModel::new(Vec::<Message>::new())), DiscoveryConfig::default())
            .with_pinned_tools(vec![broken]);

        let state = DiscoveryState::new(vec![Message::assistant_with_tool_calls(
            "",
            vec![
                ToolCall::new("c1", "broken", json!({})),
                ToolCall::new("c2", "missing", json!({})),
            ],
        )]);
        let update = agent.act_node(&state).await.unwrap();

        assert_eq!(update.messages.len(), 2);
        assert_eq!(update.messages[0].tool_call_id.as_deref(), Some("c1"));
        assert!(update.messages[0].content.contains("disk on fire"));
        assert_eq!(update.messages[1].content, "Error: tool 'missing' is not available");
    }

    #[tokio::test]
    async fn test_decide_skips_tools_that_fail_to_load() {
        let fixture = fixture().await;
        let model = Arc::new(ScriptedModel::new([Message::assistant("ok")]));
        let agent = agent(&fixture, Arc::clone(&model), DiscoveryConfig::default());

        let mut state = DiscoveryState::from_user("hi");
        state.selected_tool_ids = vec!["local:weather".to_string(), "local:gone".to_string()];
        agent.decide_node(&state).await.unwrap();

        assert_eq!(
            model.calls()[0].tool_names,
            vec![SEARCH_TOOL_NAME.to_string(), "weather".to_string()]
        );
    }

    #[tokio::test]
    async fn test_system_prompt_is_prepended_to_model_input_only() {
        let fixture = fixture().await;
        let model = Arc::new(ScriptedModel::new([Message::assistant("ok")]));
        let config = DiscoveryConfig {
            system_prompt: Some("Search before answering.".to_string()),
            ..DiscoveryConfig::default()
        };
        let agent = agent(&fixture, Arc::clone(&model), config);

        let state = agent.invoke("hi").await.unwrap();

        let input = &model.calls()[0].messages;
        assert_eq!(input[0].role, MessageRole::System);
        assert_eq!(input[0].content, "Search before answering.");
        assert_eq!(state.messages[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let fixture = fixture().await;
        let replies = (0..10).map(|i| {
            Message::assistant_with_tool_calls("", vec![search_call(&format!("s{}", i), "weather")])
        });
        let config = DiscoveryConfig {
            max_iterations: 4,
            ..DiscoveryConfig::default()
        };
        let agent = agent(&fixture, Arc::new(ScriptedModel::new(replies)), config);

        let err = agent.invoke("loop forever").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::IterationLimit(4)));
    }

    #[tokio::test]
    async fn test_route_uses_configured_search_tool_name() {
        let fixture = fixture().await;
        let config = DiscoveryConfig {
            search_tool_name: "find_tools".to_string(),
            ..DiscoveryConfig::default()
        };
        let agent = agent(&fixture, Arc::new(ScriptedModel::new(Vec::<Message>::new())), config);

        let state = DiscoveryState::new(vec![Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::new("1", "find_tools", json!({ "query": "x" }))],
        )]);
        assert_eq!(agent.route(&state), Route::Search);
    }
}

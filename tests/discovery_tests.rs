use serde_json::json;
use std::sync::Arc;
use tool_discovery::context::{ContextOptions, DiscoveryContext, ToolSet};
use tool_discovery::discovery::{DiscoveryConfig, TimeoutExecution};
use tool_discovery::llm::{Message, MessageRole, ScriptedModel, ToolCall};
use tool_discovery::search::{
    HashingEmbedder, LruEmbeddingCache, SearchIndexConfig, SearchMode,
};
use tool_discovery::tools::{FnTool, InMemoryToolProvider, ToolDefinition, ToolProvider};

fn mail_provider() -> Arc<dyn ToolProvider> {
    let provider = InMemoryToolProvider::new("mail");
    provider
        .register_fn(
            ToolDefinition::new(
                "send_email",
                "Send an email message to a recipient",
                json!({
                    "type": "object",
                    "properties": { "to": { "type": "string" } },
                    "required": ["to"]
                }),
            ),
            |args| Ok(json!({ "sent_to": args["to"] })),
        )
        .unwrap();
    Arc::new(provider)
}

fn calendar_provider() -> Arc<dyn ToolProvider> {
    let provider = InMemoryToolProvider::new("calendar");
    provider
        .register_fn(
            ToolDefinition::without_parameters("create_event", "Create a calendar event"),
            |_| Ok(json!("event created")),
        )
        .unwrap();
    Arc::new(provider)
}

async fn hybrid_context() -> DiscoveryContext {
    let options = ContextOptions {
        search: SearchIndexConfig {
            mode: SearchMode::Hybrid,
            ..SearchIndexConfig::default()
        },
        embedding_provider: Some(Arc::new(HashingEmbedder::default())),
        embedding_cache: Some(Arc::new(LruEmbeddingCache::new(16))),
        ..ContextOptions::default()
    };
    DiscoveryContext::build(
        ToolSet::Providers(vec![mail_provider(), calendar_provider()]),
        options,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_search_call_answer_over_hybrid_context() {
    let context = hybrid_context().await;
    let model = Arc::new(ScriptedModel::new([
        Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::new("c1", "search_tools", json!({ "query": "send an email" }))],
        ),
        Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::new("c2", "send_email", json!({ "to": "ada@example.com" }))],
        ),
        Message::assistant("Done, the email is on its way."),
    ]));
    let agent = context
        .agent(model.clone(), DiscoveryConfig::default())
        .unwrap();

    let state = agent.invoke("Email Ada please").await.unwrap();

    assert_eq!(state.messages.len(), 6);
    assert_eq!(state.selected_tool_ids[0], "mail:send_email");
    assert_eq!(state.search_history[0].query, "send an email");
    assert!(state.messages[1..].iter().all(|message| message.id.is_some()));

    let reply = &state.messages[4];
    assert_eq!(reply.role, MessageRole::Tool);
    let value: serde_json::Value = serde_json::from_str(&reply.content).unwrap();
    assert_eq!(value, json!({ "sent_to": "ada@example.com" }));
    assert_eq!(state.messages[5].content, "Done, the email is on its way.");
    assert_eq!(model.remaining(), 0);
}

#[tokio::test]
async fn test_removed_provider_drops_out_of_later_turns() {
    let context = hybrid_context().await;
    let model = Arc::new(ScriptedModel::new([
        Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::new("c1", "search_tools", json!({ "query": "calendar event" }))],
        ),
        Message::assistant("Found it."),
    ]));
    let agent = context
        .agent(model.clone(), DiscoveryConfig::default())
        .unwrap();

    let state = agent.invoke("Book a meeting").await.unwrap();
    assert!(state
        .selected_tool_ids
        .contains(&"calendar:create_event".to_string()));

    context.remove_provider("calendar").await;
    assert!(context.index().get("calendar:create_event").await.is_none());

    model.push_reply(Message::assistant_with_tool_calls(
        "",
        vec![ToolCall::new("c2", "create_event", json!({}))],
    ));
    model.push_reply(Message::assistant("It is gone."));

    let mut state = state;
    state.messages.push(Message::user("Create it now"));
    let state = agent.run_from(state).await.unwrap();

    let calls = model.calls();
    assert!(!calls[2].tool_names.contains(&"create_event".to_string()));
    assert_eq!(
        state.messages[state.messages.len() - 2].content,
        "Error: tool 'create_event' is not available"
    );
}

#[tokio::test]
async fn test_slow_tool_times_out_inside_the_loop() {
    let slow = FnTool::new(
        ToolDefinition::without_parameters("slow_report", "Generate a slow report"),
        |_| async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(json!("late"))
        },
    )
    .shared();
    let context = DiscoveryContext::build(ToolSet::Tools(vec![slow]), ContextOptions::default())
        .await
        .unwrap();

    let model = Arc::new(ScriptedModel::new([
        Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::new("c1", "search_tools", json!({ "query": "report" }))],
        ),
        Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::new("c2", "slow_report", json!({}))],
        ),
        Message::assistant("The report timed out."),
    ]));
    let agent = context
        .agent(model, DiscoveryConfig::default())
        .unwrap()
        .with_execution_strategy(Arc::new(TimeoutExecution::new(
            std::time::Duration::from_millis(20),
        )));

    let state = agent.invoke("Run the report").await.unwrap();

    assert_eq!(state.selected_tool_ids, vec!["local:slow_report"]);
    assert!(state.messages[4].content.starts_with("Error:"));
    assert_eq!(state.messages[5].content, "The report timed out.");
}

#[cfg(test)]
mod tests {
    use crate::error::DiscoveryError;
    use crate::tools::{result_to_text, InMemoryToolProvider, ToolDefinition, ToolProvider};
    use serde_json::json;

    fn echo_definition() -> ToolDefinition {
        ToolDefinition::new(
            "echo",
            "Echoes the input",
            json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string"
                    }
                }
            }),
        )
    }

    #[tokio::test]
    async fn test_tool_registration() {
        let provider = InMemoryToolProvider::new("test");

        provider
            .register_fn(echo_definition(), |params| {
                Ok(params.get("message").cloned().unwrap_or(json!("No message")))
            })
            .unwrap();

        let listing = provider.get_metadata().await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "echo");
        assert_eq!(listing[0].description, "Echoes the input");
        assert!(listing[0].parameters.is_some());
    }

    #[tokio::test]
    async fn test_tool_call() {
        let provider = InMemoryToolProvider::new("test");
        provider
            .register_fn(echo_definition(), |params| {
                Ok(params.get("message").cloned().unwrap_or(json!("No message")))
            })
            .unwrap();

        let handle = provider.get_tool("echo").await.unwrap().unwrap();
        let result = handle
            .invoke(json!({ "message": "Hello, world!" }))
            .await
            .unwrap();

        assert_eq!(result_to_text(&result), "Hello, world!");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let provider = InMemoryToolProvider::new("test");
        let handle = provider.get_tool("unknown").await.unwrap();
        assert!(handle.is_none());
    }

    #[tokio::test]
    async fn test_tool_error() {
        let provider = InMemoryToolProvider::new("test");
        provider
            .register_fn(
                ToolDefinition::without_parameters("fallible", "A tool that always fails"),
                |_| Err(DiscoveryError::Execution("Tool execution failed".to_string())),
            )
            .unwrap();

        let handle = provider.get_tool("fallible").await.unwrap().unwrap();
        let err = handle.invoke(json!({})).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Execution(_)));
    }

    #[tokio::test]
    async fn test_unregister_and_refresh() {
        let provider = InMemoryToolProvider::new("test");
        provider
            .register_fn(echo_definition(), |params| Ok(params))
            .unwrap();

        let mut refreshes = provider.refresh_events().unwrap();

        assert!(provider.unregister_tool("echo").unwrap());
        assert!(!provider.unregister_tool("echo").unwrap());
        assert_eq!(provider.notify_refresh().unwrap(), 1);

        let listing = refreshes.recv().await.unwrap();
        assert!(listing.is_empty());
    }

    #[test]
    fn test_result_to_text() {
        assert_eq!(result_to_text(&json!("plain")), "plain");
        assert_eq!(result_to_text(&json!({ "a": 1 })), "{\"a\":1}");
        assert_eq!(result_to_text(&json!(null)), "");
    }
}

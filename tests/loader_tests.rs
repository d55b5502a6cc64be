use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tool_discovery::catalog::{ToolCatalog, ToolMetadata};
use tool_discovery::error::{DiscoveryError, Result};
use tool_discovery::loader::{LoaderConfig, ToolLoader};
use tool_discovery::tools::{FnTool, SharedTool, ToolDefinition, ToolProvider};

/// Provider that counts handle requests and yields before answering
#[derive(Debug)]
struct CountingProvider {
    id: String,
    calls: AtomicUsize,
}

impl CountingProvider {
    fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolProvider for CountingProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get_metadata(&self) -> Result<Vec<ToolMetadata>> {
        Ok(vec![ToolMetadata::new("echo", "Echo the input back")])
    }

    async fn get_tool(&self, name: &str) -> Result<Option<SharedTool>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        if name != "echo" {
            return Ok(None);
        }
        Ok(Some(
            FnTool::sync(ToolDefinition::without_parameters("echo", "Echo the input back"), |args| Ok(args))
                .shared(),
        ))
    }
}

async fn setup(provider: Arc<CountingProvider>) -> (Arc<ToolCatalog>, ToolLoader) {
    let catalog = ToolCatalog::new();
    catalog.register_provider(provider).await.unwrap();
    let loader = ToolLoader::new(
        Arc::clone(&catalog),
        catalog.providers(),
        LoaderConfig::default(),
    );
    (catalog, loader)
}

#[tokio::test]
async fn test_concurrent_loads_share_one_fetch() {
    let provider = CountingProvider::new("slow");
    let (_catalog, loader) = setup(Arc::clone(&provider)).await;

    let (a, b, c) = tokio::join!(
        loader.load("slow:echo"),
        loader.load("slow:echo"),
        loader.load("slow:echo")
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

    assert_eq!(provider.calls(), 1);
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&b, &c));
    assert_eq!(loader.pending_count(), 0);
    assert_eq!(loader.len(), 1);

    let echoed = a.invoke(json!({ "x": 1 })).await.unwrap();
    assert_eq!(echoed, json!({ "x": 1 }));
}

#[tokio::test]
async fn test_removed_tool_is_evicted_and_refetched() {
    let provider = CountingProvider::new("slow");
    let (catalog, loader) = setup(Arc::clone(&provider)).await;

    loader.load("slow:echo").await.unwrap();
    assert!(loader.is_cached("slow:echo"));

    catalog.unregister_provider("slow").await;
    assert_eq!(loader.len(), 0);

    let err = loader.load("slow:echo").await.unwrap_err();
    assert!(matches!(err, DiscoveryError::ToolNotFound { .. }));

    catalog.register_provider(Arc::clone(&provider) as Arc<dyn ToolProvider>).await.unwrap();
    loader.load("slow:echo").await.unwrap();
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_missing_handle_is_reported() {
    #[derive(Debug)]
    struct Drifted;

    #[async_trait]
    impl ToolProvider for Drifted {
        fn id(&self) -> &str {
            "drift"
        }

        async fn get_metadata(&self) -> Result<Vec<ToolMetadata>> {
            Ok(vec![ToolMetadata::new("ghost", "Listed but never served")])
        }

        async fn get_tool(&self, _name: &str) -> Result<Option<SharedTool>> {
            Ok(None)
        }
    }

    let catalog = ToolCatalog::new();
    catalog.register_provider(Arc::new(Drifted)).await.unwrap();
    let loader = ToolLoader::new(Arc::clone(&catalog), catalog.providers(), LoaderConfig::default());

    let err = loader.load("drift:ghost").await.unwrap_err();
    assert!(matches!(err, DiscoveryError::HandleUnavailable { .. }));
    assert!(err.is_not_found());
    assert!(!loader.is_cached("drift:ghost"));
}

#[tokio::test]
async fn test_warmup_counts_successes() {
    let provider = CountingProvider::new("slow");
    let (_catalog, loader) = setup(Arc::clone(&provider)).await;

    let loaded = loader.warmup(["slow:echo", "slow:missing"]).await;

    assert_eq!(loaded, 1);
    assert!(loader.is_cached("slow:echo"));
    assert_eq!(loader.stats().loads, 1);
}

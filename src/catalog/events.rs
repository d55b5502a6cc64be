//! Observer registry for catalog change notifications.
//!
//! Listeners are awaited one at a time in subscription order. A listener that
//! fails or panics is logged and skipped; the remaining listeners still run.

use crate::catalog::types::CatalogChange;
use crate::error::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// Handle returned by [`ChangeEmitter::subscribe`]
pub type SubscriptionId = u64;

/// Callback invoked with every catalog change
pub type ChangeListener =
    Arc<dyn Fn(CatalogChange) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Ordered list of change listeners
#[derive(Default)]
pub struct ChangeEmitter {
    listeners: Mutex<Vec<(SubscriptionId, ChangeListener)>>,
    next_id: AtomicU64,
}

impl fmt::Debug for ChangeEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeEmitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ChangeEmitter {
    /// Creates an emitter with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns its subscription id
    pub fn subscribe<F, Fut>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(CatalogChange) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: ChangeListener = Arc::new(move |change| listener(change).boxed());
        self.lock().push((id, listener));
        id
    }

    /// Removes a listener, returning whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Delivers a change to every listener in order.
    ///
    /// Returns the number of listeners that failed.
    pub async fn emit(&self, change: CatalogChange) -> usize {
        let listeners: Vec<ChangeListener> = self
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        let mut failures = 0;
        for listener in listeners {
            let change = change.clone();
            let outcome = AssertUnwindSafe(async move { listener(change).await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failures += 1;
                    warn!(error = %err, "Catalog change listener failed");
                }
                Err(_) => {
                    failures += 1;
                    warn!("Catalog change listener panicked");
                }
            }
        }

        failures
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, ChangeListener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Protocol-tag keyed dispatch of inbound messages

use crate::error::GatewayResult;
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, warn};

/// Handler invoked with the authenticated user id and the sanitized
/// raw message.
pub type TagHandler =
    Arc<dyn Fn(String, String) -> BoxFuture<'static, GatewayResult<()>> + Send + Sync>;

/// Maps a protocol tag to an ordered list of handlers.
///
/// Registration is purely additive and safe to run concurrently with
/// invocation; there is no deregistration.
#[derive(Default)]
pub struct DispatchTable {
    handlers: DashMap<String, Vec<TagHandler>>,
}

impl DispatchTable {
    /// Create an empty dispatch table
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Append a handler to the list for `tag`, creating it if absent.
    pub fn register<F, Fut>(&self, tag: &str, handler: F)
    where
        F: Fn(String, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = GatewayResult<()>> + Send + 'static,
    {
        debug!(tag, "registering handler");
        let handler: TagHandler = Arc::new(move |user_id, raw| Box::pin(handler(user_id, raw)));
        self.handlers.entry(tag.to_string()).or_default().push(handler);
    }

    /// Check whether any handler is registered for a tag
    pub fn has_handlers(&self, tag: &str) -> bool {
        self.handlers
            .get(tag)
            .map(|entry| !entry.is_empty())
            .unwrap_or(false)
    }

    /// Get all registered tags
    pub fn tags(&self) -> Vec<String> {
        self.handlers
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Invoke every handler registered for `tag`, in registration
    /// order. A handler failure is logged and does not stop later
    /// handlers; an unknown tag is a logged no-op.
    pub async fn invoke(&self, tag: &str, user_id: &str, raw: &str) {
        // Clone the list out of the shard so no lock is held across await.
        let handlers: Vec<TagHandler> = match self.handlers.get(tag) {
            Some(entry) => entry.value().clone(),
            None => {
                warn!(tag, user_id, "no handler registered for tag");
                return;
            }
        };

        for (index, handler) in handlers.into_iter().enumerate() {
            if let Err(e) = handler(user_id.to_string(), raw.to_string()).await {
                warn!(tag, user_id, index, error = %e, "dispatch handler failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn handlers_run_in_registration_order() {
        let table = DispatchTable::new();
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = order.clone();
            table.register("chat", move |_user, _raw| {
                let order = order.clone();
                async move {
                    order.lock().await.push(label);
                    Ok(())
                }
            });
        }

        table.invoke("chat", "alice", "{}").await;
        assert_eq!(*order.lock().await, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn failing_handler_does_not_suppress_later_ones() {
        let table = DispatchTable::new();
        let ran = Arc::new(AtomicUsize::new(0));

        table.register("chat", |_user, _raw| async {
            Err(GatewayError::Handler("boom".to_string()))
        });
        let ran_clone = ran.clone();
        table.register("chat", move |_user, _raw| {
            let ran = ran_clone.clone();
            async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        table.invoke("chat", "alice", "{}").await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_tag_is_a_no_op() {
        let table = DispatchTable::new();
        assert!(!table.has_handlers("nope"));
        // Must not panic or execute anything.
        table.invoke("nope", "alice", "{}").await;
    }

    #[tokio::test]
    async fn handlers_receive_user_and_payload() {
        let table = DispatchTable::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        table.register("echo", move |user_id, raw| {
            let tx = tx.clone();
            async move {
                tx.send((user_id, raw))
                    .map_err(|e| GatewayError::Handler(e.to_string()))
            }
        });

        assert!(table.has_handlers("echo"));
        assert_eq!(table.tags(), vec!["echo".to_string()]);

        table.invoke("echo", "bob", r#"{"action":"echo"}"#).await;
        assert_eq!(
            rx.recv().await,
            Some(("bob".to_string(), r#"{"action":"echo"}"#.to_string()))
        );
    }
}

//! Action Handler Registry - action name to local handler.
//!
//! One handler per action; registering again replaces the previous one.

use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// What a handler produces. The error's display string is what the peer sees.
pub type HandlerResult = anyhow::Result<Value>;

/// Type-erased handler future
pub type HandlerFuture = BoxFuture<'static, HandlerResult>;

/// Type-erased handler
pub type ActionHandler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as an `ActionHandler`.
pub fn async_handler<F, Fut>(f: F) -> ActionHandler
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |payload| f(payload).boxed())
}

/// Wrap a synchronous closure as an `ActionHandler`.
///
/// The closure runs inside the returned future, so a panic is observed by
/// whoever polls it rather than at lookup time.
pub fn sync_handler<F>(f: F) -> ActionHandler
where
    F: Fn(Value) -> HandlerResult + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |payload| {
        let f = Arc::clone(&f);
        async move { f(payload) }.boxed()
    })
}

/// Per-instance handler table.
#[derive(Default)]
pub struct ActionHandlerRegistry {
    handlers: DashMap<String, ActionHandler>,
}

impl ActionHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the action.
    ///
    /// Returns true if a handler was replaced.
    pub fn register(&self, action_name: impl Into<String>, handler: ActionHandler) -> bool {
        let action_name = action_name.into();
        let replaced = self.handlers.insert(action_name.clone(), handler).is_some();
        debug!(action = %action_name, replaced = replaced, "Registered action handler");
        replaced
    }

    pub fn get(&self, action_name: &str) -> Option<ActionHandler> {
        self.handlers
            .get(action_name)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, action_name: &str) -> bool {
        self.handlers.contains_key(action_name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered action names, sorted.
    pub fn actions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_invoke_sync() {
        let registry = ActionHandlerRegistry::new();
        registry.register("double", sync_handler(|v| Ok(json!(v.as_i64().unwrap_or(0) * 2))));

        let handler = registry.get("double").unwrap();
        assert_eq!(handler(json!(21)).await.unwrap(), json!(42));
    }

    #[tokio::test]
    async fn test_register_and_invoke_async() {
        let registry = ActionHandlerRegistry::new();
        registry.register(
            "later",
            async_handler(|v| async move {
                tokio::task::yield_now().await;
                Ok(v)
            }),
        );

        let handler = registry.get("later").unwrap();
        assert_eq!(handler(json!({"a": 1})).await.unwrap(), json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let registry = ActionHandlerRegistry::new();
        assert!(!registry.register("greet", sync_handler(|_| Ok(json!("first")))));
        assert!(registry.register("greet", sync_handler(|_| Ok(json!("second")))));
        assert_eq!(registry.len(), 1);

        let handler = registry.get("greet").unwrap();
        assert_eq!(handler(Value::Null).await.unwrap(), json!("second"));
    }

    #[test]
    fn test_missing_handler() {
        let registry = ActionHandlerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("nope").is_none());
        assert!(!registry.contains("nope"));
    }

    #[test]
    fn test_actions_sorted() {
        let registry = ActionHandlerRegistry::new();
        registry.register("b", sync_handler(|_| Ok(Value::Null)));
        registry.register("a", sync_handler(|_| Ok(Value::Null)));
        assert_eq!(registry.actions(), vec!["a".to_string(), "b".to_string()]);
    }
}

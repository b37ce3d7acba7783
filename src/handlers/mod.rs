//! Task handlers and the registry that dispatches to them by type tag.

pub mod builtin;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::HandlerError;
use crate::task::Task;

/// Type tag of the fallback handler used when no dedicated handler exists.
pub const DEFAULT_HANDLER: &str = "default";

/// Executes one kind of task.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Do the work and return a completion summary.
    async fn handle(&self, task: &Task) -> Result<String, HandlerError>;
}

/// Adapts an async closure into a [`TaskHandler`].
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(Task) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, HandlerError>> + Send,
{
    async fn handle(&self, task: &Task) -> Result<String, HandlerError> {
        (self.f)(task.clone()).await
    }
}

/// Maps task type tags to handlers.
///
/// Populated at startup. Registering a tag twice replaces the earlier handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn TaskHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a task type.
    pub async fn register(&self, task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        let task_type = task_type.into();
        let replaced = self
            .handlers
            .write()
            .await
            .insert(task_type.clone(), handler)
            .is_some();
        if replaced {
            tracing::debug!(task_type = %task_type, "Replaced task handler");
        } else {
            tracing::debug!(task_type = %task_type, "Registered task handler");
        }
    }

    /// Register an async closure as the handler for a task type.
    pub async fn register_fn<F, Fut>(&self, task_type: impl Into<String>, f: F)
    where
        F: Fn(Task) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, HandlerError>> + Send + 'static,
    {
        self.register(task_type, Arc::new(FnHandler::new(f))).await;
    }

    /// Handler for `task_type`, falling back to the `default` handler.
    pub async fn resolve(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        let handlers = self.handlers.read().await;
        handlers
            .get(task_type)
            .or_else(|| handlers.get(DEFAULT_HANDLER))
            .cloned()
    }

    pub async fn has(&self, task_type: &str) -> bool {
        self.handlers.read().await.contains_key(task_type)
    }

    /// Registered type tags.
    pub async fn task_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.read().await.keys().cloned().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(summary: &'static str) -> Arc<dyn TaskHandler> {
        Arc::new(FnHandler::new(move |_task: Task| async move {
            Ok::<_, HandlerError>(summary.to_string())
        }))
    }

    #[tokio::test]
    async fn resolves_registered_type() {
        let registry = HandlerRegistry::new();
        registry.register("backend", constant("backend done")).await;

        let handler = registry.resolve("backend").await.unwrap();
        let summary = handler.handle(&Task::new("t1", "backend")).await.unwrap();
        assert_eq!(summary, "backend done");
        assert!(registry.resolve("devops").await.is_none());
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let registry = HandlerRegistry::new();
        registry.register("backend", constant("first")).await;
        registry.register("backend", constant("second")).await;

        let handler = registry.resolve("backend").await.unwrap();
        assert_eq!(handler.handle(&Task::new("t1", "backend")).await.unwrap(), "second");
        assert_eq!(registry.task_types().await, vec!["backend"]);
    }

    #[tokio::test]
    async fn falls_back_to_default_handler() {
        let registry = HandlerRegistry::new();
        registry.register(DEFAULT_HANDLER, constant("fallback")).await;

        let handler = registry.resolve("anything").await.unwrap();
        assert_eq!(handler.handle(&Task::new("t1", "anything")).await.unwrap(), "fallback");
        assert!(!registry.has("anything").await);
    }

    #[tokio::test]
    async fn closure_handlers_see_the_task() {
        let registry = HandlerRegistry::new();
        registry
            .register_fn("echo", |task: Task| async move { Ok(format!("echo {}", task.id)) })
            .await;

        let handler = registry.resolve("echo").await.unwrap();
        assert_eq!(handler.handle(&Task::new("t7", "echo")).await.unwrap(), "echo t7");
    }
}

//! Starter handlers for the `backend`, `devops` and `testing` task types.
//!
//! Each dispatches on `metadata.action` and returns a summary for the
//! marketplace. Real deployments replace these with their own handlers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::HandlerError;
use crate::handlers::{HandlerRegistry, TaskHandler};
use crate::task::Task;

/// Register the starter handlers under their task types.
pub async fn register_builtin(registry: &HandlerRegistry) {
    registry.register("backend", Arc::new(BackendHandler)).await;
    registry.register("devops", Arc::new(DevopsHandler)).await;
    registry.register("testing", Arc::new(TestingHandler)).await;
}

fn generic(task: &Task, kind: &str) -> String {
    info!(task_id = %task.id, title = %task.title, "Processing {kind} task");
    format!("Completed: {}", task.title)
}

/// Metadata field that must be present for a given action.
fn required<'a>(task: &'a Task, key: &str) -> Result<&'a str, HandlerError> {
    task.metadata_str(key)
        .ok_or_else(|| HandlerError::failed(&task.id, format!("missing metadata field `{key}`")))
}

/// Code review, refactoring and optimisation tasks.
pub struct BackendHandler;

#[async_trait]
impl TaskHandler for BackendHandler {
    async fn handle(&self, task: &Task) -> Result<String, HandlerError> {
        let files = task
            .metadata
            .get("files")
            .and_then(|v| v.as_array())
            .map(|a| a.len())
            .unwrap_or(0);

        match task.metadata_str("action") {
            Some("code-review") => {
                let repo = required(task, "repository")?;
                info!(task_id = %task.id, repository = %repo, "Reviewing code");
                Ok(format!("Code review completed for {repo}. All checks passed."))
            }
            Some("refactor") => {
                let repo = required(task, "repository")?;
                Ok(format!("Refactored {files} files in {repo}."))
            }
            Some("optimize") => {
                let repo = required(task, "repository")?;
                Ok(format!("Optimized {files} files in {repo}."))
            }
            _ => Ok(generic(task, "backend")),
        }
    }
}

/// Deployment and infrastructure tasks.
pub struct DevopsHandler;

#[async_trait]
impl TaskHandler for DevopsHandler {
    async fn handle(&self, task: &Task) -> Result<String, HandlerError> {
        match task.metadata_str("action") {
            Some("deploy") => {
                let service = required(task, "service")?;
                let env = task.metadata_str("environment").unwrap_or("staging");
                info!(task_id = %task.id, service = %service, environment = %env, "Deploying");
                Ok(format!("Deployed {service} to {env}."))
            }
            Some("rollback") => {
                let service = required(task, "service")?;
                let env = task.metadata_str("environment").unwrap_or("staging");
                Ok(format!("Rolled back {service} in {env}."))
            }
            Some("scale") => {
                let service = required(task, "service")?;
                let replicas = task
                    .metadata
                    .get("replicas")
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| HandlerError::failed(&task.id, "missing metadata field `replicas`"))?;
                Ok(format!("Scaled {service} to {replicas} replicas."))
            }
            Some("health-check") => {
                let service = required(task, "service")?;
                Ok(format!("{service} is healthy."))
            }
            _ => Ok(generic(task, "devops")),
        }
    }
}

/// Test execution and coverage tasks.
pub struct TestingHandler;

#[async_trait]
impl TaskHandler for TestingHandler {
    async fn handle(&self, task: &Task) -> Result<String, HandlerError> {
        match task.metadata_str("action") {
            Some("run-tests") => {
                let repo = required(task, "repository")?;
                let suite = task.metadata_str("testSuite").unwrap_or("all");
                Ok(format!("All tests passed in {repo}. Suite: {suite}"))
            }
            Some("coverage") => {
                let repo = required(task, "repository")?;
                Ok(format!("Coverage report generated for {repo}."))
            }
            Some("integration") => {
                let repo = required(task, "repository")?;
                Ok(format!("Integration tests passed for {repo}."))
            }
            Some("e2e") => {
                let repo = required(task, "repository")?;
                Ok(format!("E2E tests passed for {repo}."))
            }
            _ => Ok(generic(task, "testing")),
        }
    }
}

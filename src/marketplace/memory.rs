//! In-process marketplace.
//!
//! Arbitrates claims the same way the hosted marketplace does: the first
//! claim on an available task wins, every later claim gets a conflict.
//! Failure switches let callers simulate an unreliable backend.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::MarketplaceError;
use crate::marketplace::{AuditEntry, Marketplace};
use crate::task::{Task, TaskStatus};

#[derive(Default)]
struct State {
    /// Tasks in listing order.
    tasks: Vec<Task>,
    claims: Vec<String>,
    completions: Vec<(String, String)>,
    audit: Vec<AuditEntry>,
    fail_listing: bool,
    fail_audit: bool,
    failing_claims: HashSet<String>,
    failing_completions: HashSet<String>,
}

impl State {
    fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }
}

fn unavailable() -> MarketplaceError {
    MarketplaceError::Status {
        status: 503,
        body: "service unavailable".to_string(),
    }
}

/// Marketplace held entirely in memory.
#[derive(Default)]
pub struct InMemoryMarketplace {
    state: RwLock<State>,
}

impl InMemoryMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a marketplace pre-seeded with tasks.
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            state: RwLock::new(State {
                tasks: tasks.into_iter().collect(),
                ..State::default()
            }),
        }
    }

    /// List a new task.
    pub async fn push(&self, task: Task) {
        self.state.write().await.tasks.push(task);
    }

    /// Simulate another worker winning the claim on `task_id`.
    pub async fn claim_elsewhere(&self, task_id: &str) {
        if let Some(task) = self.state.write().await.task_mut(task_id) {
            task.status = TaskStatus::Claimed;
        }
    }

    /// Make every listing fail until switched off.
    pub async fn set_listing_fails(&self, fail: bool) {
        self.state.write().await.fail_listing = fail;
    }

    /// Make the audit log endpoint fail until switched off.
    pub async fn set_audit_fails(&self, fail: bool) {
        self.state.write().await.fail_audit = fail;
    }

    /// Make claims on `task_id` fail with a server error.
    pub async fn fail_claims_for(&self, task_id: &str) {
        self.state
            .write()
            .await
            .failing_claims
            .insert(task_id.to_string());
    }

    /// Make completion reports for `task_id` fail with a server error.
    pub async fn fail_completions_for(&self, task_id: &str) {
        self.state
            .write()
            .await
            .failing_completions
            .insert(task_id.to_string());
    }

    /// Ids successfully claimed, in claim order.
    pub async fn claims(&self) -> Vec<String> {
        self.state.read().await.claims.clone()
    }

    /// `(task_id, summary)` pairs reported as completed.
    pub async fn completions(&self) -> Vec<(String, String)> {
        self.state.read().await.completions.clone()
    }

    pub async fn audit_log(&self) -> Vec<AuditEntry> {
        self.state.read().await.audit.clone()
    }

    pub async fn status_of(&self, task_id: &str) -> Option<TaskStatus> {
        self.state
            .read()
            .await
            .tasks
            .iter()
            .find(|t| t.id == task_id)
            .map(|t| t.status)
    }
}

#[async_trait]
impl Marketplace for InMemoryMarketplace {
    async fn list_available(&self) -> Result<Vec<Task>, MarketplaceError> {
        let state = self.state.read().await;
        if state.fail_listing {
            return Err(unavailable());
        }
        Ok(state
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Available)
            .cloned()
            .collect())
    }

    async fn claim(&self, task_id: &str) -> Result<(), MarketplaceError> {
        let mut state = self.state.write().await;
        if state.failing_claims.contains(task_id) {
            return Err(unavailable());
        }

        let task = state.task_mut(task_id).ok_or_else(|| MarketplaceError::Status {
            status: 404,
            body: format!("task {task_id} not found"),
        })?;
        if task.status != TaskStatus::Available {
            return Err(MarketplaceError::Conflict {
                task_id: task_id.to_string(),
            });
        }
        task.status = TaskStatus::Claimed;
        state.claims.push(task_id.to_string());
        Ok(())
    }

    async fn complete(&self, task_id: &str, summary: &str) -> Result<(), MarketplaceError> {
        let mut state = self.state.write().await;
        if state.failing_completions.contains(task_id) {
            return Err(unavailable());
        }

        let task = state.task_mut(task_id).ok_or_else(|| MarketplaceError::Status {
            status: 404,
            body: format!("task {task_id} not found"),
        })?;
        if task.status != TaskStatus::Claimed {
            return Err(MarketplaceError::Status {
                status: 400,
                body: format!("task {task_id} is {}, not claimed", task.status),
            });
        }
        task.status = TaskStatus::Completed;
        state
            .completions
            .push((task_id.to_string(), summary.to_string()));
        Ok(())
    }

    async fn log_audit(&self, entry: &AuditEntry) -> Result<(), MarketplaceError> {
        let mut state = self.state.write().await;
        if state.fail_audit {
            return Err(unavailable());
        }
        state.audit.push(entry.clone());
        Ok(())
    }
}

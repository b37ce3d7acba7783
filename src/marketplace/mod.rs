//! Task marketplace collaborator.
//!
//! The marketplace holds the authoritative queue and arbitrates claims.
//! The worker talks to it only through the [`Marketplace`] trait:
//! - `http` — REST client for the hosted marketplace
//! - `memory` — in-process marketplace for local runs and tests

pub mod http;
pub mod memory;

pub use http::HttpMarketplace;
pub use memory::InMemoryMarketplace;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MarketplaceError;
use crate::task::Task;

/// Entry written to the marketplace's memory log (audit trail).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: String,
    /// The task id this entry is about.
    pub entity: String,
    pub details: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl AuditEntry {
    /// A `blocked` entry recording why a task could not be finished.
    pub fn blocked(task_id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            action: "blocked".to_string(),
            entity: task_id.into(),
            details: format!("Task failed: {reason}"),
            tags: vec!["worker".to_string(), "error".to_string()],
        }
    }
}

/// Operations the worker consumes from the marketplace.
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// Tasks currently marked available. May be stale or contain duplicates.
    async fn list_available(&self) -> Result<Vec<Task>, MarketplaceError>;

    /// Reserve a task for this worker.
    ///
    /// Returns [`MarketplaceError::Conflict`] when another worker already owns it.
    async fn claim(&self, task_id: &str) -> Result<(), MarketplaceError>;

    /// Mark a claimed task completed with a summary of the work done.
    async fn complete(&self, task_id: &str, summary: &str) -> Result<(), MarketplaceError>;

    /// Append an entry to the audit log.
    async fn log_audit(&self, entry: &AuditEntry) -> Result<(), MarketplaceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_entry_shape() {
        let entry = AuditEntry::blocked("task-9", "disk full");
        assert_eq!(entry.action, "blocked");
        assert_eq!(entry.entity, "task-9");
        assert_eq!(entry.details, "Task failed: disk full");
        assert_eq!(entry.tags, vec!["worker", "error"]);
    }
}

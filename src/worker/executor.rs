//! Runs a claimed task through its handler and reports the outcome.
//!
//! The capacity permit travels with the execution and is dropped on every
//! exit path. A panicking handler is caught and treated as a failure.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{Error, HandlerError, WorkerError};
use crate::handlers::HandlerRegistry;
use crate::marketplace::{AuditEntry, Marketplace};
use crate::task::Task;
use crate::worker::capacity::CapacityPermit;

/// Summary sent when a handler returns an empty one.
pub const DEFAULT_SUMMARY: &str = "Task completed successfully";

pub struct TaskExecutor {
    marketplace: Arc<dyn Marketplace>,
    registry: Arc<HandlerRegistry>,
}

impl TaskExecutor {
    pub fn new(marketplace: Arc<dyn Marketplace>, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            marketplace,
            registry,
        }
    }

    /// Execute in the background. Failures are logged, never propagated to the poll loop.
    pub fn spawn(self: &Arc<Self>, task: Task, permit: CapacityPermit) -> JoinHandle<()> {
        let executor = Arc::clone(self);
        tokio::spawn(async move {
            let task_id = task.id.clone();
            if let Err(e) = executor.run(task, permit).await {
                error!(task_id = %task_id, error = %e, "Task failed");
            }
        })
    }

    /// Execute `task`, report the outcome, and release `permit` on return.
    pub async fn run(&self, task: Task, permit: CapacityPermit) -> Result<String, Error> {
        let _permit = permit;

        let Some(handler) = self.registry.resolve(&task.task_type).await else {
            let err = HandlerError::NotFound {
                task_type: task.task_type.clone(),
            };
            self.audit_blocked(&task.id, &err.reason()).await;
            return Err(err.into());
        };

        let outcome = AssertUnwindSafe(handler.handle(&task))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                error!(task_id = %task.id, panic = %message, "Handler panicked");
                Err(HandlerError::failed(
                    task.id.clone(),
                    format!("handler panicked: {message}"),
                ))
            });

        let summary = match outcome {
            Ok(summary) if summary.trim().is_empty() => DEFAULT_SUMMARY.to_string(),
            Ok(summary) => summary,
            Err(e) => {
                self.audit_blocked(&task.id, &e.reason()).await;
                return Err(e.into());
            }
        };

        if let Err(source) = self.marketplace.complete(&task.id, &summary).await {
            self.audit_blocked(&task.id, &format!("completion report failed: {source}"))
                .await;
            return Err(WorkerError::CompletionFailed {
                task_id: task.id.clone(),
                source,
            }
            .into());
        }

        info!(task_id = %task.id, "Completed task");
        Ok(summary)
    }

    /// Best effort: a failing audit log never masks the original error.
    async fn audit_blocked(&self, task_id: &str, reason: &str) {
        let entry = AuditEntry::blocked(task_id, reason);
        if let Err(e) = self.marketplace.log_audit(&entry).await {
            warn!(task_id = %task_id, error = %e, "Failed to write audit entry");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

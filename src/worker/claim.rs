//! Claim protocol: reserve a task on the marketplace and classify the result.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::MarketplaceError;
use crate::marketplace::Marketplace;

/// Result of a claim attempt.
#[derive(Debug)]
pub enum ClaimOutcome {
    /// This worker now owns the task.
    Claimed,
    /// Another worker got there first. Expected under contention; never retried.
    AlreadyClaimed,
    /// Anything else. The task is skipped this cycle and may reappear later.
    TransientError(MarketplaceError),
}

impl ClaimOutcome {
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed)
    }
}

/// Claims tasks on behalf of one worker.
pub struct ClaimProtocol {
    marketplace: Arc<dyn Marketplace>,
}

impl ClaimProtocol {
    pub fn new(marketplace: Arc<dyn Marketplace>) -> Self {
        Self { marketplace }
    }

    pub async fn claim(&self, task_id: &str) -> ClaimOutcome {
        match self.marketplace.claim(task_id).await {
            Ok(()) => ClaimOutcome::Claimed,
            Err(e) if e.is_conflict() => {
                debug!(task_id = %task_id, "Task already claimed by another worker");
                ClaimOutcome::AlreadyClaimed
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Error claiming task");
                ClaimOutcome::TransientError(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::InMemoryMarketplace;
    use crate::task::Task;

    #[tokio::test]
    async fn classifies_outcomes() {
        let marketplace = Arc::new(InMemoryMarketplace::with_tasks([
            Task::new("free", "x"),
            Task::new("taken", "x"),
            Task::new("broken", "x"),
        ]));
        marketplace.claim_elsewhere("taken").await;
        marketplace.fail_claims_for("broken").await;

        let protocol = ClaimProtocol::new(marketplace.clone());
        assert!(protocol.claim("free").await.is_claimed());
        assert!(matches!(protocol.claim("taken").await, ClaimOutcome::AlreadyClaimed));
        assert!(matches!(
            protocol.claim("broken").await,
            ClaimOutcome::TransientError(MarketplaceError::Status { status: 503, .. })
        ));
        assert!(matches!(
            protocol.claim("missing").await,
            ClaimOutcome::TransientError(MarketplaceError::Status { status: 404, .. })
        ));
        assert_eq!(marketplace.claims().await, vec!["free"]);
    }
}

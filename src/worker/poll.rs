//! Poll loop: the scheduling heart of the worker.
//!
//! Each cycle: compute remaining capacity, fetch available tasks, keep the
//! ones this worker's skills allow, then claim and dispatch in listing order
//! until capacity runs out. The next cycle is armed only after the current
//! one finishes, so cycles never overlap.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::marketplace::Marketplace;
use crate::task::Task;
use crate::worker::capacity::CapacityGate;
use crate::worker::claim::{ClaimOutcome, ClaimProtocol};
use crate::worker::executor::TaskExecutor;

/// Where the poll loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PollState {
    /// Waiting for the next tick.
    Idle = 0,
    /// Fetching the available-task listing.
    Polling = 1,
    /// Claiming and dispatching candidates.
    Dispatching = 2,
    /// No further ticks will be scheduled.
    Stopping = 3,
}

impl PollState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Polling,
            2 => Self::Dispatching,
            3 => Self::Stopping,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Polling => "polling",
            Self::Dispatching => "dispatching",
            Self::Stopping => "stopping",
        };
        write!(f, "{s}")
    }
}

/// What happened during one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Capacity available when the cycle started.
    pub capacity: usize,
    /// Tasks returned by the marketplace.
    pub fetched: usize,
    /// Tasks that passed skill filtering.
    pub eligible: usize,
    /// Ids claimed and dispatched, in claim order.
    pub dispatched: Vec<String>,
    /// Claims lost to other workers.
    pub conflicts: usize,
    /// Claims that failed for any other reason.
    pub errors: usize,
    /// Whether the listing could not be fetched.
    pub fetch_failed: bool,
}

pub struct PollLoop {
    config: WorkerConfig,
    marketplace: Arc<dyn Marketplace>,
    claims: ClaimProtocol,
    gate: Arc<CapacityGate>,
    executor: Arc<TaskExecutor>,
    state: AtomicU8,
}

impl PollLoop {
    pub fn new(
        config: WorkerConfig,
        marketplace: Arc<dyn Marketplace>,
        gate: Arc<CapacityGate>,
        executor: Arc<TaskExecutor>,
    ) -> Self {
        Self {
            config,
            claims: ClaimProtocol::new(Arc::clone(&marketplace)),
            marketplace,
            gate,
            executor,
            state: AtomicU8::new(PollState::Idle as u8),
        }
    }

    pub fn state(&self) -> PollState {
        PollState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: PollState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn interval(&self) -> Duration {
        self.config.poll_interval
    }

    /// Tick until `shutdown` flips to `true`.
    ///
    /// A cycle already in progress when shutdown is signalled runs to the end,
    /// but no further cycle is scheduled.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval = ?self.config.poll_interval,
            concurrency = self.config.concurrency,
            "Poll loop started"
        );

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            self.run_cycle().await;

            if *shutdown.borrow() {
                break;
            }

            let sender_dropped = tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => false,
                changed = shutdown.changed() => changed.is_err(),
            };
            if sender_dropped {
                break;
            }
        }

        self.set_state(PollState::Stopping);
        info!("Poll loop stopped");
    }

    /// Run a single poll cycle.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport {
            capacity: self.gate.remaining(),
            ..CycleReport::default()
        };

        if report.capacity == 0 {
            debug!(active = self.gate.size(), "At capacity, skipping fetch");
            return report;
        }

        self.set_state(PollState::Polling);
        let tasks = match self.marketplace.list_available().await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(error = %e, "Poll error");
                report.fetch_failed = true;
                Vec::new()
            }
        };
        report.fetched = tasks.len();

        let eligible: Vec<Task> = tasks
            .into_iter()
            .filter(|t| t.matches_skills(&self.config.skills))
            .collect();
        report.eligible = eligible.len();

        self.set_state(PollState::Dispatching);
        let mut remaining = report.capacity;
        for task in eligible {
            if remaining == 0 {
                break;
            }
            // Stale listings can still show tasks this worker is running.
            if self.gate.contains(&task.id) {
                continue;
            }

            match self.claims.claim(&task.id).await {
                ClaimOutcome::Claimed => {
                    let Some(permit) = self.gate.admit(&task.id) else {
                        // The remote claim is left to expire on the marketplace.
                        warn!(task_id = %task.id, "Claimed task could not be admitted; abandoning");
                        continue;
                    };
                    info!(task_id = %task.id, title = %task.title, "Claimed task");
                    report.dispatched.push(task.id.clone());
                    self.executor.spawn(task, permit);
                    remaining -= 1;
                }
                ClaimOutcome::AlreadyClaimed => report.conflicts += 1,
                ClaimOutcome::TransientError(_) => report.errors += 1,
            }
        }

        self.set_state(PollState::Idle);
        report
    }
}

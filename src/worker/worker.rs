//! Worker: owns the poll loop and coordinates graceful shutdown.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::error::{ConfigError, WorkerError};
use crate::handlers::HandlerRegistry;
use crate::marketplace::Marketplace;
use crate::worker::capacity::CapacityGate;
use crate::worker::executor::TaskExecutor;
use crate::worker::poll::{CycleReport, PollLoop, PollState};

/// A marketplace worker process.
///
/// One poll loop per instance; the concurrency limit applies to this
/// instance only.
pub struct Worker {
    id: Uuid,
    config: WorkerConfig,
    gate: Arc<CapacityGate>,
    poll: Arc<PollLoop>,
    shutdown_tx: watch::Sender<bool>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
    /// Held shared by foreground cycles and exclusively by `stop()`.
    foreground: RwLock<()>,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        marketplace: Arc<dyn Marketplace>,
        registry: Arc<HandlerRegistry>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let gate = Arc::new(CapacityGate::new(config.concurrency));
        let executor = Arc::new(TaskExecutor::new(Arc::clone(&marketplace), registry));
        let poll = Arc::new(PollLoop::new(
            config.clone(),
            marketplace,
            Arc::clone(&gate),
            executor,
        ));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            id: Uuid::new_v4(),
            config,
            gate,
            poll,
            shutdown_tx,
            loop_handle: Mutex::new(None),
            foreground: RwLock::new(()),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Number of tasks currently executing.
    pub fn active_count(&self) -> usize {
        self.gate.size()
    }

    pub fn active_tasks(&self) -> Vec<String> {
        self.gate.active_ids()
    }

    pub fn poll_state(&self) -> PollState {
        self.poll.state()
    }

    /// Whether the poll loop is scheduled to keep ticking.
    pub fn is_running(&self) -> bool {
        !*self.shutdown_tx.borrow()
            && self
                .loop_handle
                .try_lock()
                .map(|h| h.as_ref().is_some_and(|h| !h.is_finished()))
                .unwrap_or(true)
    }

    /// Start polling in the background. The first cycle runs immediately.
    pub async fn start(&self) -> Result<(), WorkerError> {
        let mut handle = self.loop_handle.lock().await;
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(WorkerError::AlreadyRunning);
        }

        self.shutdown_tx.send_replace(false);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let span = info_span!("worker", worker_id = %self.id);
        *handle = Some(tokio::spawn(
            Arc::clone(&self.poll).run(shutdown_rx).instrument(span),
        ));

        info!(
            worker_id = %self.id,
            concurrency = self.config.concurrency,
            skills = %self.config.skills.join(","),
            "Worker started"
        );
        Ok(())
    }

    /// Run one poll cycle in the foreground, independent of `start()`.
    ///
    /// After `stop()` this claims nothing and returns an empty report until
    /// the worker is started again.
    pub async fn run_cycle(&self) -> CycleReport {
        let _cycle = self.foreground.read().await;
        if *self.shutdown_tx.borrow() {
            return CycleReport::default();
        }
        self.poll.run_cycle().await
    }

    /// Stop taking new work and wait for in-flight tasks to finish.
    ///
    /// Running tasks are never cancelled. On return no task is executing.
    pub async fn stop(&self) {
        self.shutdown_tx.send_replace(true);

        // Let a cycle that already started finish, so nothing is admitted after the drain check.
        if let Some(handle) = self.loop_handle.lock().await.take()
            && let Err(e) = handle.await
        {
            tracing::error!(worker_id = %self.id, error = %e, "Poll loop ended abnormally");
        }
        drop(self.foreground.write().await);

        loop {
            let active = self.gate.size();
            if active == 0 {
                break;
            }
            info!(worker_id = %self.id, active, "Waiting for active tasks...");
            tokio::time::sleep(self.config.drain_check_interval).await;
        }

        info!(worker_id = %self.id, "Worker stopped");
    }
}

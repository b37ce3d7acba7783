//! Error types for the marketplace worker.

use std::time::Duration;

/// Top-level error type for the worker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Marketplace error: {0}")]
    Marketplace(#[from] MarketplaceError),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors talking to the task marketplace.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    /// The marketplace reports the resource is already owned (HTTP 409).
    #[error("Task {task_id} is already claimed")]
    Conflict { task_id: String },

    #[error("Marketplace returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl MarketplaceError {
    /// Whether this is the marketplace's "already owned" signal.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Task handler errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    #[error("No handler for task type: {task_type}")]
    NotFound { task_type: String },

    #[error("Task {task_id} failed: {reason}")]
    Failed { task_id: String, reason: String },
}

impl HandlerError {
    /// Shorthand for a handler failure.
    pub fn failed(task_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            task_id: task_id.into(),
            reason: reason.into(),
        }
    }

    /// The human-readable reason, without the task id prefix.
    pub fn reason(&self) -> String {
        match self {
            Self::NotFound { .. } => self.to_string(),
            Self::Failed { reason, .. } => reason.clone(),
        }
    }
}

/// Worker lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Worker is already running")]
    AlreadyRunning,

    #[error("Task {task_id} rejected: capacity of {limit} reached")]
    CapacityExceeded { task_id: String, limit: usize },

    #[error("Completion report for task {task_id} failed: {source}")]
    CompletionFailed {
        task_id: String,
        #[source]
        source: MarketplaceError,
    },
}

/// Result type alias for the worker.
pub type Result<T> = std::result::Result<T, Error>;

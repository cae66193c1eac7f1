//! Error types for the worker

use std::time::Duration;
use thiserror::Error;

/// Worker errors
#[derive(Debug, Error)]
pub enum WorkerError {
    // ============ Protocol Errors ============
    #[error("malformed {kind}: {message}")]
    Protocol { kind: &'static str, message: String },

    // ============ Broker Errors ============
    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),

    #[error("broker operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    // ============ Collaborator Errors ============
    #[error(transparent)]
    Store(#[from] chartmq_repo::RepoError),

    #[error("consumer task failed: {0}")]
    Task(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for worker operations
pub type Result<T> = std::result::Result<T, WorkerError>;

impl WorkerError {
    pub(crate) fn protocol(kind: &'static str, message: impl std::fmt::Display) -> Self {
        WorkerError::Protocol {
            kind,
            message: message.to_string(),
        }
    }

    /// Whether the message itself was unusable
    pub fn is_protocol(&self) -> bool {
        matches!(self, WorkerError::Protocol { .. })
    }
}

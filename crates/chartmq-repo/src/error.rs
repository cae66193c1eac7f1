//! Error types for repository store operations

use thiserror::Error;

/// Repository store errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Storage Errors ============
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Could not determine data directory for the repository database")]
    NoDataDir,

    // ============ Credential Errors ============
    #[error("Credential error for repository '{name}': {source}")]
    Credential {
        name: String,
        #[source]
        source: chartmq_core::CoreError,
    },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for repository store operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl From<tokio::task::JoinError> for RepoError {
    fn from(e: tokio::task::JoinError) -> Self {
        RepoError::Unavailable {
            message: e.to_string(),
        }
    }
}

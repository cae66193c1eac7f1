//! CLI error types with exit code handling

use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI error type carrying its exit code
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {message}")]
    #[diagnostic(code(chartmq::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Broker connection or channel failure
    #[error("Broker error: {message}")]
    #[diagnostic(
        code(chartmq::broker),
        help("check broker.uri and that the broker is reachable")
    )]
    Broker { message: String },

    /// Repository store failure
    #[error("Store error: {message}")]
    #[diagnostic(code(chartmq::store), help("check database.path"))]
    Store { message: String },

    /// IO error
    #[error("IO error: {message}")]
    #[diagnostic(code(chartmq::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(chartmq::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Broker { .. } => exit_codes::BROKER_ERROR,
            CliError::Store { .. } => exit_codes::STORE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for CliError {
    fn from(err: config::ConfigError) -> Self {
        CliError::config(err.to_string())
    }
}

impl From<chartmq_repo::RepoError> for CliError {
    fn from(err: chartmq_repo::RepoError) -> Self {
        CliError::Store {
            message: err.to_string(),
        }
    }
}

impl From<chartmq_core::CoreError> for CliError {
    fn from(err: chartmq_core::CoreError) -> Self {
        CliError::internal(err.to_string())
    }
}

impl From<chartmq_worker::WorkerError> for CliError {
    fn from(err: chartmq_worker::WorkerError) -> Self {
        use chartmq_worker::WorkerError;
        match err {
            WorkerError::Store(e) => e.into(),
            e @ (WorkerError::Broker(_) | WorkerError::Timeout { .. }) => CliError::Broker {
                message: e.to_string(),
            },
            other => CliError::internal(other.to_string()),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

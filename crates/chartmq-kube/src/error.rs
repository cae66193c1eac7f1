//! Error types for chartmq-kube

use thiserror::Error;

/// Result type for chartmq-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while driving releases
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Chart search returned nothing
    #[error("Chart does not exists")]
    ChartNotFound { name: String },

    /// Release has no history in the namespace
    #[error("release '{name}' not found in namespace '{namespace}'")]
    ReleaseNotFound { name: String, namespace: String },

    /// Repository is not registered with the package manager
    #[error("no repo named \"{name}\" found")]
    RepositoryNotFound { name: String },

    /// Rollback not possible
    #[error("cannot rollback release '{name}': {reason}")]
    RollbackNotPossible { name: String, reason: String },

    /// Upgrade failed and the release was returned to its previous revision
    #[error("UPGRADE FAILED: {message}; rolled back to revision {revision}")]
    UpgradeRolledBack { message: String, revision: u32 },

    /// Package manager command exited with an error
    #[error("{message}")]
    CommandFailed { command: String, message: String },

    /// Cluster or package manager unreachable
    #[error("connection error: {0}")]
    Connection(String),

    /// Timeout
    #[error("operation timed out after {0}")]
    Timeout(String),

    /// Cluster target cannot be turned into a kubeconfig
    #[error("invalid cluster target: {0}")]
    InvalidTarget(String),

    /// Repository descriptor rejected before registration
    #[error("{0}")]
    InvalidRepository(String),

    /// Override values could not be parsed
    #[error("invalid values: {0}")]
    Values(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<chartmq_core::CoreError> for KubeError {
    fn from(e: chartmq_core::CoreError) -> Self {
        match &e {
            chartmq_core::CoreError::InvalidRepository { .. } => {
                KubeError::InvalidRepository(e.to_string())
            }
            _ => KubeError::Values(e.to_string()),
        }
    }
}

impl KubeError {
    /// Check if the release or chart does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            KubeError::ReleaseNotFound { .. }
                | KubeError::ChartNotFound { .. }
                | KubeError::RepositoryNotFound { .. }
        )
    }

    /// Check if the cluster or package manager could not be reached in time
    pub fn is_connection(&self) -> bool {
        matches!(self, KubeError::Connection(_) | KubeError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_not_found_message() {
        let err = KubeError::ChartNotFound {
            name: "missing-chart".to_string(),
        };
        assert_eq!(err.to_string(), "Chart does not exists");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rolled_back_message() {
        let err = KubeError::UpgradeRolledBack {
            message: "image pull failed".to_string(),
            revision: 4,
        };
        assert_eq!(
            err.to_string(),
            "UPGRADE FAILED: image pull failed; rolled back to revision 4"
        );
    }

    #[test]
    fn test_classification() {
        assert!(KubeError::Timeout("10m".into()).is_connection());
        assert!(KubeError::Connection("refused".into()).is_connection());
        assert!(
            !KubeError::CommandFailed {
                command: "helm install".into(),
                message: "boom".into()
            }
            .is_connection()
        );
    }
}

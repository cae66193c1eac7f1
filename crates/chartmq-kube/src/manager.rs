//! Package manager contract
//!
//! The orchestrator never talks to a cluster directly. It drives a
//! [`PackageManager`], which owns chart search, release history, the
//! install/upgrade/rollback operations and the repository registry.

use async_trait::async_trait;
use chartmq_core::RepositorySpec;
use serde::{Deserialize, Serialize};

use crate::actions::{InstallOptions, RollbackOptions, UpgradeOptions};
use crate::error::Result;
use crate::release::ReleaseRevision;
use crate::session::ClusterSession;

/// One search hit from the package manager's repository index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartMatch {
    /// Canonical `repo/chart` name
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub app_version: String,
    #[serde(default)]
    pub description: String,
}

impl ChartMatch {
    /// Create a search hit
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            app_version: String::new(),
            description: String::new(),
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Operations the release orchestrator needs from a package manager
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Search the local repository index, best match first
    async fn search(&self, term: &str, all_versions: bool) -> Result<Vec<ChartMatch>>;

    /// Most recent revisions of a release, newest first, at most `max` entries
    ///
    /// Returns [`KubeError::ReleaseNotFound`](crate::KubeError::ReleaseNotFound)
    /// when the release has never been installed in the namespace.
    async fn release_history(
        &self,
        session: &ClusterSession,
        name: &str,
        namespace: &str,
        max: usize,
    ) -> Result<Vec<ReleaseRevision>>;

    /// Fresh install of a chart
    async fn install(&self, session: &ClusterSession, options: &InstallOptions) -> Result<()>;

    /// Update an existing release in place
    async fn upgrade(&self, session: &ClusterSession, options: &UpgradeOptions) -> Result<()>;

    /// Return a release to an earlier revision
    async fn rollback(&self, session: &ClusterSession, options: &RollbackOptions) -> Result<()>;

    /// Add or replace a repository in the registry
    async fn register_repository(&self, repo: &RepositorySpec) -> Result<()>;

    /// Remove a repository from the registry
    async fn remove_repository(&self, name: &str) -> Result<()>;

    /// Refresh every registered repository index
    async fn update_repositories(&self) -> Result<()>;
}

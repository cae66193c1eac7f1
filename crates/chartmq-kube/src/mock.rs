//! Mock package manager for testing
//!
//! Keeps a chart catalogue, release histories and the repository registry in
//! memory. Failures can be scripted per operation, and every call is counted
//! so tests can assert on side effects without a cluster or a helm binary.

use async_trait::async_trait;
use chartmq_core::RepositorySpec;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::actions::{InstallOptions, RollbackOptions, UpgradeOptions};
use crate::error::{KubeError, Result};
use crate::manager::{ChartMatch, PackageManager};
use crate::release::{ReleaseRevision, ReleaseStatus};
use crate::session::ClusterSession;

/// In-memory package manager for testing
#[derive(Clone, Default)]
pub struct MockPackageManager {
    state: Arc<RwLock<MockState>>,
    operations: Arc<RwLock<OperationCounts>>,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub searches: usize,
    pub histories: usize,
    pub installs: usize,
    pub upgrades: usize,
    pub rollbacks: usize,
    pub registrations: usize,
    pub removals: usize,
    pub updates: usize,
}

#[derive(Default)]
struct MockState {
    charts: Vec<ChartMatch>,
    /// release name -> revisions, oldest first
    releases: HashMap<String, Vec<ReleaseRevision>>,
    repositories: BTreeMap<String, RepositorySpec>,
    installed: Vec<InstallOptions>,
    upgraded: Vec<UpgradeOptions>,
    rolled_back: Vec<RollbackOptions>,
    history_error: Option<String>,
    install_error: Option<String>,
    upgrade_error: Option<String>,
    rollback_error: Option<String>,
    update_error: Option<String>,
    failing_repositories: HashSet<String>,
}

impl MockPackageManager {
    /// Create an empty mock
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the search index
    pub fn with_charts(self, charts: Vec<ChartMatch>) -> Self {
        self.write().charts = charts;
        self
    }

    /// Seed a release history, oldest revision first
    pub fn with_release(self, name: &str, history: Vec<ReleaseRevision>) -> Self {
        self.write().releases.insert(name.to_string(), history);
        self
    }

    /// Seed an already registered repository
    pub fn with_repository(self, repo: RepositorySpec) -> Self {
        self.write().repositories.insert(repo.name.clone(), repo);
        self
    }

    /// History lookups fail with a generic error
    pub fn fail_history(self, message: &str) -> Self {
        self.write().history_error = Some(message.to_string());
        self
    }

    /// Installs fail
    pub fn fail_install(self, message: &str) -> Self {
        self.write().install_error = Some(message.to_string());
        self
    }

    /// Upgrades fail
    pub fn fail_upgrade(self, message: &str) -> Self {
        self.write().upgrade_error = Some(message.to_string());
        self
    }

    /// Rollbacks fail
    pub fn fail_rollback(self, message: &str) -> Self {
        self.write().rollback_error = Some(message.to_string());
        self
    }

    /// Repository index refresh fails
    pub fn fail_update(self, message: &str) -> Self {
        self.write().update_error = Some(message.to_string());
        self
    }

    /// Registering this repository fails
    pub fn fail_registration(self, name: &str) -> Self {
        self.write().failing_repositories.insert(name.to_string());
        self
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Registered repositories, by name
    pub fn repositories(&self) -> Vec<RepositorySpec> {
        self.read().repositories.values().cloned().collect()
    }

    /// Whether a repository is registered
    pub fn has_repository(&self, name: &str) -> bool {
        self.read().repositories.contains_key(name)
    }

    /// Install calls received
    pub fn installs(&self) -> Vec<InstallOptions> {
        self.read().installed.clone()
    }

    /// Upgrade calls received
    pub fn upgrades(&self) -> Vec<UpgradeOptions> {
        self.read().upgraded.clone()
    }

    /// Rollback calls received
    pub fn rollbacks(&self) -> Vec<RollbackOptions> {
        self.read().rolled_back.clone()
    }

    /// Current history of a release, oldest first
    pub fn history_of(&self, name: &str) -> Vec<ReleaseRevision> {
        self.read().releases.get(name).cloned().unwrap_or_default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MockState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MockState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn count(&self, f: impl FnOnce(&mut OperationCounts)) {
        let mut ops = self.operations.write().unwrap_or_else(|e| e.into_inner());
        f(&mut ops);
    }

    fn push_revision(&self, name: &str, namespace: &str, chart: &str, description: &str) {
        let mut state = self.write();
        let history = state.releases.entry(name.to_string()).or_default();
        for rev in history.iter_mut() {
            if rev.status == ReleaseStatus::Deployed {
                rev.status = ReleaseStatus::Superseded;
            }
        }
        let next = history.last().map(|r| r.revision + 1).unwrap_or(1);
        let mut revision =
            ReleaseRevision::new(next, ReleaseStatus::Deployed, chart).in_namespace(namespace);
        revision.description = description.to_string();
        history.push(revision);
    }
}

fn failed(command: &str, message: &str) -> KubeError {
    KubeError::CommandFailed {
        command: command.to_string(),
        message: message.to_string(),
    }
}

fn require_kubeconfig(session: &ClusterSession) -> Result<()> {
    if session.kubeconfig_path().exists() {
        Ok(())
    } else {
        Err(KubeError::Connection("kubeconfig missing".to_string()))
    }
}

#[async_trait]
impl PackageManager for MockPackageManager {
    async fn search(&self, term: &str, all_versions: bool) -> Result<Vec<ChartMatch>> {
        self.count(|ops| ops.searches += 1);
        let needle = term.to_lowercase();
        let state = self.read();

        let mut seen = HashSet::new();
        Ok(state
            .charts
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&needle))
            .filter(|c| all_versions || seen.insert(c.name.clone()))
            .cloned()
            .collect())
    }

    async fn release_history(
        &self,
        session: &ClusterSession,
        name: &str,
        namespace: &str,
        max: usize,
    ) -> Result<Vec<ReleaseRevision>> {
        self.count(|ops| ops.histories += 1);
        require_kubeconfig(session)?;
        let state = self.read();
        if let Some(message) = &state.history_error {
            return Err(failed("helm history", message));
        }

        match state.releases.get(name) {
            Some(history) if !history.is_empty() => {
                Ok(history.iter().rev().take(max).cloned().collect())
            }
            _ => Err(KubeError::ReleaseNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            }),
        }
    }

    async fn install(&self, session: &ClusterSession, options: &InstallOptions) -> Result<()> {
        self.count(|ops| ops.installs += 1);
        require_kubeconfig(session)?;
        let error = {
            let mut state = self.write();
            state.installed.push(options.clone());
            state.install_error.clone()
        };
        if let Some(message) = error {
            return Err(failed("helm install", &message));
        }
        if !options.dry_run {
            self.push_revision(
                &options.name,
                &options.namespace,
                &options.chart,
                "Install complete",
            );
        }
        Ok(())
    }

    async fn upgrade(&self, session: &ClusterSession, options: &UpgradeOptions) -> Result<()> {
        self.count(|ops| ops.upgrades += 1);
        require_kubeconfig(session)?;
        let error = {
            let mut state = self.write();
            state.upgraded.push(options.clone());
            state.upgrade_error.clone()
        };
        if let Some(message) = error {
            return Err(failed("helm upgrade", &message));
        }
        if !options.dry_run {
            self.push_revision(
                &options.name,
                &options.namespace,
                &options.chart,
                "Upgrade complete",
            );
        }
        Ok(())
    }

    async fn rollback(&self, session: &ClusterSession, options: &RollbackOptions) -> Result<()> {
        self.count(|ops| ops.rollbacks += 1);
        require_kubeconfig(session)?;
        let (error, chart) = {
            let mut state = self.write();
            state.rolled_back.push(options.clone());
            let chart = state
                .releases
                .get(&options.name)
                .and_then(|h| h.iter().find(|r| r.revision == options.revision))
                .map(|r| r.chart.clone());
            (state.rollback_error.clone(), chart)
        };
        if let Some(message) = error {
            return Err(failed("helm rollback", &message));
        }
        let chart = chart.ok_or_else(|| KubeError::RollbackNotPossible {
            name: options.name.clone(),
            reason: format!("revision {} not found", options.revision),
        })?;
        if !options.dry_run {
            let description = format!("Rollback to {}", options.revision);
            self.push_revision(&options.name, &options.namespace, &chart, &description);
        }
        Ok(())
    }

    async fn register_repository(&self, repo: &RepositorySpec) -> Result<()> {
        self.count(|ops| ops.registrations += 1);
        repo.validate()?;
        let mut state = self.write();
        if state.failing_repositories.contains(&repo.name) {
            return Err(failed(
                "helm repo add",
                &format!("looks like \"{}\" is not a valid chart repository", repo.url),
            ));
        }
        state.repositories.insert(repo.name.clone(), repo.clone());
        Ok(())
    }

    async fn remove_repository(&self, name: &str) -> Result<()> {
        self.count(|ops| ops.removals += 1);
        match self.write().repositories.remove(name) {
            Some(_) => Ok(()),
            None => Err(KubeError::RepositoryNotFound {
                name: name.to_string(),
            }),
        }
    }

    async fn update_repositories(&self) -> Result<()> {
        self.count(|ops| ops.updates += 1);
        let state = self.read();
        if let Some(message) = &state.update_error {
            return Err(failed("helm repo update", message));
        }
        if state.repositories.is_empty() {
            return Err(failed("helm repo update", "no repositories found"));
        }
        Ok(())
    }
}

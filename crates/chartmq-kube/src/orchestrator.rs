//! Release orchestration: install, upgrade and rollback
//!
//! A request walks through
//! `Resolving -> Deciding -> Installing | Upgrading -> (RollingBack) -> Done`.
//! The chart name is resolved first; the release history, bounded to the most
//! recent revision, then decides between a fresh install and an in-place
//! upgrade. A failed upgrade on an atomic request rolls back to the revision
//! captured before the upgrade started.
//!
//! [`ReleaseOrchestrator::run`] never fails: every request ends in exactly one
//! [`DeployOutcome`], successful or carrying the terminal error message.

use chartmq_core::parse_overrides;
use std::path::PathBuf;
use std::sync::Arc;

use crate::actions::{InstallOptions, RollbackOptions, UpgradeOptions};
use crate::error::{KubeError, Result};
use crate::kubeconfig::ClusterTarget;
use crate::manager::PackageManager;
use crate::resolver::{ChartResolver, version_constraint};
use crate::session::ClusterSession;

/// Everything needed to deploy one release
#[derive(Debug, Clone, Default)]
pub struct DeployRequest {
    /// Release name
    pub release: String,
    /// Chart name as supplied by the client, possibly informal
    pub chart: String,
    /// Version constraint; empty means any
    pub chart_version: String,
    /// Release namespace; empty falls back to the target's namespace
    pub namespace: String,
    /// Ordered `key=value` overrides
    pub overrides: Vec<String>,
    pub dry_run: bool,
    /// Roll back to the previous revision when an upgrade fails
    pub atomic: bool,
    /// Cluster to deploy into
    pub target: ClusterTarget,
    /// Caller supplied name for the credential file, used in logs only
    pub label: String,
}

impl DeployRequest {
    /// Namespace the release lives in
    pub fn effective_namespace(&self) -> &str {
        let ns = self.namespace.trim();
        if ns.is_empty() {
            self.target.effective_namespace()
        } else {
            ns
        }
    }
}

/// States of the release state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePhase {
    Resolving,
    Deciding,
    Installing,
    Upgrading,
    RollingBack,
    Done,
}

impl std::fmt::Display for ReleasePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Resolving => "resolving",
            Self::Deciding => "deciding",
            Self::Installing => "installing",
            Self::Upgrading => "upgrading",
            Self::RollingBack => "rolling-back",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Terminal result of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    /// Every state entered, in order, ending with `Done`
    pub phases: Vec<ReleasePhase>,
    /// Terminal error message, `None` on success
    pub error: Option<String>,
}

impl DeployOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Whether the machine passed through `phase`
    pub fn reached(&self, phase: ReleasePhase) -> bool {
        self.phases.contains(&phase)
    }
}

enum Decision {
    Install,
    Upgrade { previous: Option<u32> },
}

/// Drives releases through the package manager
pub struct ReleaseOrchestrator {
    manager: Arc<dyn PackageManager>,
    resolver: ChartResolver,
    work_dir: PathBuf,
}

impl ReleaseOrchestrator {
    /// Create an orchestrator writing its sessions under `work_dir`
    pub fn new(manager: Arc<dyn PackageManager>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            resolver: ChartResolver::new(Arc::clone(&manager)),
            manager,
            work_dir: work_dir.into(),
        }
    }

    /// Chart resolver sharing this orchestrator's package manager
    pub fn resolver(&self) -> &ChartResolver {
        &self.resolver
    }

    /// Run a request to completion
    pub async fn run(&self, request: &DeployRequest) -> DeployOutcome {
        let mut phases = Vec::new();
        let result = self.drive(request, &mut phases).await;
        phases.push(ReleasePhase::Done);

        match &result {
            Ok(()) => tracing::info!(
                release = %request.release,
                namespace = %request.effective_namespace(),
                dry_run = request.dry_run,
                "release deployed"
            ),
            Err(e) => tracing::error!(
                release = %request.release,
                namespace = %request.effective_namespace(),
                error = %e,
                "release failed"
            ),
        }

        DeployOutcome {
            phases,
            error: result.err().map(|e| e.to_string()),
        }
    }

    async fn drive(&self, req: &DeployRequest, phases: &mut Vec<ReleasePhase>) -> Result<()> {
        enter(phases, ReleasePhase::Resolving, req);
        let chart = self.resolver.resolve(&req.chart).await?;

        let overrides = parse_overrides(&req.overrides)?;
        let namespace = req.effective_namespace();
        let version = version_constraint(&req.chart_version);

        let session = ClusterSession::open(&self.work_dir, &req.target, &req.label)?;
        let values_file = session.write_values(&overrides)?;

        enter(phases, ReleasePhase::Deciding, req);
        let decision = self.decide(&session, req, namespace).await;

        match decision {
            Decision::Install => {
                enter(phases, ReleasePhase::Installing, req);
                let options = InstallOptions::new(&req.release, namespace)
                    .with_chart(&chart.resolved_name, version)
                    .with_values(values_file)
                    .dry_run(req.dry_run);
                self.manager.install(&session, &options).await
            }
            Decision::Upgrade { previous } => {
                enter(phases, ReleasePhase::Upgrading, req);
                let options = UpgradeOptions::new(&req.release, namespace)
                    .with_chart(&chart.resolved_name, version)
                    .with_values(values_file)
                    .wait(req.atomic)
                    .dry_run(req.dry_run);

                match self.manager.upgrade(&session, &options).await {
                    Ok(()) => Ok(()),
                    Err(e) if req.atomic => {
                        enter(phases, ReleasePhase::RollingBack, req);
                        Err(self.roll_back(&session, req, namespace, previous, e).await)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    async fn decide(&self, session: &ClusterSession, req: &DeployRequest, namespace: &str) -> Decision {
        match self
            .manager
            .release_history(session, &req.release, namespace, 1)
            .await
        {
            Ok(history) => match history.first() {
                Some(latest) => {
                    if let Some(recorded) = latest.namespace.as_deref()
                        && recorded != namespace
                    {
                        tracing::warn!(
                            release = %req.release,
                            requested = %namespace,
                            recorded = %recorded,
                            "namespace differs from the one recorded for this release"
                        );
                    }
                    tracing::debug!(
                        release = %req.release,
                        revision = latest.revision,
                        status = %latest.status,
                        "captured current revision"
                    );
                    Decision::Upgrade {
                        previous: Some(latest.revision),
                    }
                }
                None => Decision::Install,
            },
            Err(KubeError::ReleaseNotFound { .. }) => Decision::Install,
            Err(e) => {
                tracing::warn!(
                    release = %req.release,
                    error = %e,
                    "history lookup failed, attempting upgrade"
                );
                Decision::Upgrade { previous: None }
            }
        }
    }

    /// Roll back after a failed upgrade; the returned error is terminal
    async fn roll_back(
        &self,
        session: &ClusterSession,
        req: &DeployRequest,
        namespace: &str,
        previous: Option<u32>,
        upgrade_error: KubeError,
    ) -> KubeError {
        tracing::warn!(release = %req.release, error = %upgrade_error, "upgrade failed, rolling back");

        let Some(revision) = previous else {
            return KubeError::RollbackNotPossible {
                name: req.release.clone(),
                reason: "no previous revision recorded".to_string(),
            };
        };

        let options = RollbackOptions::new(&req.release, namespace)
            .to_revision(revision)
            .with_force()
            .wait(true)
            .dry_run(req.dry_run);

        match self.manager.rollback(session, &options).await {
            Ok(()) => KubeError::UpgradeRolledBack {
                message: upgrade_error.to_string(),
                revision,
            },
            Err(rollback_error) => rollback_error,
        }
    }
}

fn enter(phases: &mut Vec<ReleasePhase>, phase: ReleasePhase, req: &DeployRequest) {
    tracing::debug!(release = %req.release, phase = %phase, "release state");
    phases.push(phase);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ChartMatch;
    use crate::mock::MockPackageManager;
    use crate::release::{ReleaseRevision, ReleaseStatus};
    use crate::resolver::ANY_VERSION;
    use std::path::Path;
    use super::ReleasePhase::*;

    fn request(release: &str, chart: &str) -> DeployRequest {
        DeployRequest {
            release: release.to_string(),
            chart: chart.to_string(),
            namespace: "apps".to_string(),
            target: ClusterTarget {
                name: "dev".to_string(),
                token: "token".to_string(),
                ca_certificate: "ca".to_string(),
                cluster_uri: "https://dev.example.com".to_string(),
                namespace: "apps".to_string(),
            },
            label: "dev.yaml".to_string(),
            ..Default::default()
        }
    }

    fn charts() -> MockPackageManager {
        MockPackageManager::new().with_charts(vec![ChartMatch::new("bitnami/nginx", "15.0.0")])
    }

    fn deployed(revisions: u32) -> Vec<ReleaseRevision> {
        (1..=revisions)
            .map(|r| {
                let status = if r == revisions {
                    ReleaseStatus::Deployed
                } else {
                    ReleaseStatus::Superseded
                };
                ReleaseRevision::new(r, status, "nginx-14.0.0").in_namespace("apps")
            })
            .collect()
    }

    fn orchestrator(pm: &MockPackageManager, work: &Path) -> ReleaseOrchestrator {
        ReleaseOrchestrator::new(Arc::new(pm.clone()), work)
    }

    #[tokio::test]
    async fn test_fresh_release_installs() {
        let work = tempfile::tempdir().unwrap();
        let pm = charts();
        let outcome = orchestrator(&pm, work.path())
            .run(&request("r1", "nginx"))
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.phases, vec![Resolving, Deciding, Installing, Done]);

        let installs = pm.installs();
        assert_eq!(installs.len(), 1);
        assert_eq!(installs[0].chart, "bitnami/nginx");
        assert_eq!(installs[0].version, ANY_VERSION);
        assert_eq!(installs[0].namespace, "apps");
        assert_eq!(pm.operation_counts().upgrades, 0);
    }

    #[tokio::test]
    async fn test_unresolved_chart_stops_early() {
        let work = tempfile::tempdir().unwrap();
        let pm = charts();
        let outcome = orchestrator(&pm, work.path())
            .run(&request("r1", "missing-chart"))
            .await;

        assert_eq!(outcome.error.as_deref(), Some("Chart does not exists"));
        assert_eq!(outcome.phases, vec![Resolving, Done]);
        assert_eq!(pm.operation_counts().histories, 0);
    }

    #[tokio::test]
    async fn test_existing_release_upgrades_with_force_and_hooks() {
        let work = tempfile::tempdir().unwrap();
        let pm = charts().with_release("r1", deployed(2));
        let mut req = request("r1", "nginx");
        req.dry_run = true;
        req.chart_version = "15.0.0".to_string();

        let outcome = orchestrator(&pm, work.path()).run(&req).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.phases, vec![Resolving, Deciding, Upgrading, Done]);
        let upgrades = pm.upgrades();
        assert_eq!(upgrades.len(), 1);
        assert!(upgrades[0].force);
        assert!(!upgrades[0].no_hooks);
        assert!(upgrades[0].dry_run);
        assert_eq!(upgrades[0].version, "15.0.0");
    }

    #[tokio::test]
    async fn test_failed_atomic_upgrade_rolls_back() {
        let work = tempfile::tempdir().unwrap();
        let pm = charts()
            .with_release("r1", deployed(2))
            .fail_upgrade("timed out waiting for the condition");
        let mut req = request("r1", "nginx");
        req.atomic = true;

        let outcome = orchestrator(&pm, work.path()).run(&req).await;

        assert_eq!(
            outcome.phases,
            vec![Resolving, Deciding, Upgrading, RollingBack, Done]
        );
        assert_eq!(
            outcome.error.as_deref(),
            Some("UPGRADE FAILED: timed out waiting for the condition; rolled back to revision 2")
        );
        let rollbacks = pm.rollbacks();
        assert_eq!(rollbacks.len(), 1);
        assert_eq!(rollbacks[0].revision, 2);
        assert!(rollbacks[0].force);
        assert!(rollbacks[0].wait);
        assert!(pm.upgrades()[0].wait);
    }

    #[tokio::test]
    async fn test_rollback_failure_supersedes_upgrade_error() {
        let work = tempfile::tempdir().unwrap();
        let pm = charts()
            .with_release("r1", deployed(3))
            .fail_upgrade("upgrade boom")
            .fail_rollback("rollback boom");
        let mut req = request("r1", "nginx");
        req.atomic = true;

        let outcome = orchestrator(&pm, work.path()).run(&req).await;

        assert!(outcome.reached(RollingBack));
        assert_eq!(outcome.error.as_deref(), Some("rollback boom"));
    }

    #[tokio::test]
    async fn test_failed_upgrade_without_atomic_reports_upgrade_error() {
        let work = tempfile::tempdir().unwrap();
        let pm = charts()
            .with_release("r1", deployed(1))
            .fail_upgrade("upgrade boom");

        let outcome = orchestrator(&pm, work.path())
            .run(&request("r1", "nginx"))
            .await;

        assert!(!outcome.reached(RollingBack));
        assert_eq!(outcome.error.as_deref(), Some("upgrade boom"));
        assert_eq!(pm.operation_counts().rollbacks, 0);
        assert!(!pm.upgrades()[0].wait);
    }

    #[tokio::test]
    async fn test_history_error_goes_to_upgrade() {
        let work = tempfile::tempdir().unwrap();
        let pm = charts().fail_history("etcdserver: request timed out");

        let outcome = orchestrator(&pm, work.path())
            .run(&request("r1", "nginx"))
            .await;

        assert!(outcome.is_success());
        assert!(outcome.reached(Upgrading));
        assert!(!outcome.reached(Installing));
    }

    #[tokio::test]
    async fn test_atomic_upgrade_without_captured_revision() {
        let work = tempfile::tempdir().unwrap();
        let pm = charts()
            .fail_history("etcdserver: request timed out")
            .fail_upgrade("upgrade boom");
        let mut req = request("r1", "nginx");
        req.atomic = true;

        let outcome = orchestrator(&pm, work.path()).run(&req).await;

        assert!(outcome.reached(RollingBack));
        let error = outcome.error.unwrap();
        assert!(error.contains("no previous revision recorded"), "{}", error);
        assert_eq!(pm.operation_counts().rollbacks, 0);
    }

    #[tokio::test]
    async fn test_namespace_mismatch_is_not_fatal() {
        let work = tempfile::tempdir().unwrap();
        let history = vec![ReleaseRevision::new(1, ReleaseStatus::Deployed, "nginx-1").in_namespace("legacy")];
        let pm = charts().with_release("r1", history);

        let outcome = orchestrator(&pm, work.path())
            .run(&request("r1", "nginx"))
            .await;

        assert!(outcome.is_success());
        assert!(outcome.reached(Upgrading));
    }

    #[tokio::test]
    async fn test_malformed_override_fails_before_cluster_calls() {
        let work = tempfile::tempdir().unwrap();
        let pm = charts();
        let mut req = request("r1", "nginx");
        req.overrides = vec!["replicas".to_string()];

        let outcome = orchestrator(&pm, work.path()).run(&req).await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.phases, vec![Resolving, Done]);
        assert_eq!(pm.operation_counts().histories, 0);
    }

    #[tokio::test]
    async fn test_overrides_passed_as_values_file_and_session_removed() {
        let work = tempfile::tempdir().unwrap();
        let pm = charts();
        let mut req = request("r1", "nginx");
        req.overrides = vec!["image.tag=1.25".to_string(), "replicas=3".to_string()];

        let outcome = orchestrator(&pm, work.path()).run(&req).await;
        assert!(outcome.is_success());

        let installs = pm.installs();
        let values_file = installs[0].values_file.clone().unwrap();
        assert!(values_file.starts_with(work.path()));
        assert!(!values_file.exists());
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_namespace_uses_target() {
        let work = tempfile::tempdir().unwrap();
        let pm = charts();
        let mut req = request("r1", "nginx");
        req.namespace.clear();
        req.target.namespace = "team-a".to_string();

        orchestrator(&pm, work.path()).run(&req).await;
        assert_eq!(pm.installs()[0].namespace, "team-a");
    }

    #[tokio::test]
    async fn test_install_failure_is_reported() {
        let work = tempfile::tempdir().unwrap();
        let pm = charts().fail_install("INSTALLATION FAILED: quota exceeded");

        let outcome = orchestrator(&pm, work.path())
            .run(&request("r1", "nginx"))
            .await;

        assert_eq!(outcome.phases, vec![Resolving, Deciding, Installing, Done]);
        assert_eq!(
            outcome.error.as_deref(),
            Some("INSTALLATION FAILED: quota exceeded")
        );
    }
}

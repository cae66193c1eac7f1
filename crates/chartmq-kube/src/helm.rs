//! Package manager backed by the helm v3 binary
//!
//! Every call spawns `helm` with an explicit `--kubeconfig` taken from the
//! request's [`ClusterSession`], so no ambient cluster configuration leaks
//! in. Calls are bounded by a timeout; an expired call kills the child.

use async_trait::async_trait;
use chartmq_core::RepositorySpec;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::actions::{InstallOptions, RollbackOptions, UpgradeOptions};
use crate::error::{KubeError, Result};
use crate::manager::{ChartMatch, PackageManager};
use crate::release::ReleaseRevision;
use crate::session::ClusterSession;

/// Settings for the helm driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelmConfig {
    /// helm executable
    pub binary: PathBuf,

    /// Directory receiving per-request sessions
    pub work_dir: PathBuf,

    /// Exported as `HELM_REPOSITORY_CONFIG`
    pub repository_config: Option<PathBuf>,

    /// Exported as `HELM_REPOSITORY_CACHE`
    pub repository_cache: Option<PathBuf>,

    /// Bound for release operations (history, install, upgrade, rollback)
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Bound for search and repository registry operations
    #[serde(with = "humantime_serde")]
    pub repository_timeout: Duration,
}

impl Default for HelmConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("helm"),
            work_dir: std::env::temp_dir().join("chartmq"),
            repository_config: None,
            repository_cache: None,
            timeout: Duration::from_secs(600),
            repository_timeout: Duration::from_secs(120),
        }
    }
}

/// helm v3 command line driver
pub struct HelmCli {
    config: HelmConfig,
    /// Serializes mutations of the shared repository registry
    registry: Mutex<()>,
}

impl HelmCli {
    /// Create a driver with the given settings
    pub fn new(config: HelmConfig) -> Self {
        Self {
            config,
            registry: Mutex::new(()),
        }
    }

    /// Run helm and return stdout
    async fn run(
        &self,
        args: Vec<OsString>,
        stdin: Option<&str>,
        timeout: Duration,
    ) -> Result<String> {
        let label = command_label(&args);
        tracing::debug!(command = %label, "running helm");

        let mut cmd = Command::new(&self.config.binary);
        cmd.args(&args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = &self.config.repository_config {
            cmd.env("HELM_REPOSITORY_CONFIG", path);
        }
        if let Some(path) = &self.config.repository_cache {
            cmd.env("HELM_REPOSITORY_CACHE", path);
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KubeError::Connection(format!(
                    "helm binary '{}' not found",
                    self.config.binary.display()
                ))
            } else {
                KubeError::Io(e)
            }
        })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
        }

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                tracing::warn!(command = %label, ?timeout, "helm call timed out");
                return Err(KubeError::Timeout(format!("{:?}", timeout)));
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(classify_failure(&label, &stderr))
        }
    }
}

/// `helm <sub> <sub>` prefix used in logs and errors
fn command_label(args: &[OsString]) -> String {
    let mut label = String::from("helm");
    for arg in args.iter().take(2) {
        let arg = arg.to_string_lossy();
        if arg.starts_with('-') {
            break;
        }
        label.push(' ');
        label.push_str(&arg);
    }
    label
}

/// Map helm's stderr onto the error taxonomy
fn classify_failure(command: &str, stderr: &str) -> KubeError {
    let message = stderr
        .lines()
        .rev()
        .find(|l| l.starts_with("Error:"))
        .or_else(|| stderr.lines().rev().find(|l| !l.trim().is_empty()))
        .unwrap_or("exited with an error")
        .trim()
        .trim_start_matches("Error:")
        .trim()
        .to_string();

    let lower = message.to_lowercase();
    if lower.contains("release: not found") {
        return KubeError::ReleaseNotFound {
            name: String::new(),
            namespace: String::new(),
        };
    }
    if let Some(name) = message
        .strip_prefix("no repo named \"")
        .and_then(|rest| rest.split('"').next())
    {
        return KubeError::RepositoryNotFound {
            name: name.to_string(),
        };
    }
    if [
        "cluster unreachable",
        "connection refused",
        "no such host",
        "i/o timeout",
        "tls handshake timeout",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
    {
        return KubeError::Connection(message);
    }

    KubeError::CommandFailed {
        command: command.to_string(),
        message,
    }
}

fn cluster_args(session: &ClusterSession, namespace: &str) -> Vec<OsString> {
    vec![
        "--kubeconfig".into(),
        session.kubeconfig_path().into(),
        "--namespace".into(),
        namespace.into(),
    ]
}

pub(crate) fn search_args(term: &str, all_versions: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "search".into(),
        "repo".into(),
        term.into(),
        "--output".into(),
        "json".into(),
    ];
    if all_versions {
        args.push("--versions".into());
    }
    args
}

pub(crate) fn install_args(session: &ClusterSession, opts: &InstallOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "install".into(),
        opts.name.as_str().into(),
        opts.chart.as_str().into(),
    ];
    if !opts.version.is_empty() {
        args.push("--version".into());
        args.push(opts.version.as_str().into());
    }
    args.extend(cluster_args(session, &opts.namespace));
    if let Some(values) = &opts.values_file {
        args.push("--values".into());
        args.push(values.into());
    }
    if opts.dry_run {
        args.push("--dry-run".into());
    }
    args
}

pub(crate) fn upgrade_args(session: &ClusterSession, opts: &UpgradeOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "upgrade".into(),
        opts.name.as_str().into(),
        opts.chart.as_str().into(),
    ];
    if !opts.version.is_empty() {
        args.push("--version".into());
        args.push(opts.version.as_str().into());
    }
    args.extend(cluster_args(session, &opts.namespace));
    if let Some(values) = &opts.values_file {
        args.push("--values".into());
        args.push(values.into());
    }
    if opts.force {
        args.push("--force".into());
    }
    if opts.no_hooks {
        args.push("--no-hooks".into());
    }
    if opts.wait {
        args.push("--wait".into());
    }
    if opts.dry_run {
        args.push("--dry-run".into());
    }
    args
}

pub(crate) fn rollback_args(session: &ClusterSession, opts: &RollbackOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "rollback".into(),
        opts.name.as_str().into(),
        opts.revision.to_string().into(),
    ];
    args.extend(cluster_args(session, &opts.namespace));
    if opts.force {
        args.push("--force".into());
    }
    if opts.wait {
        args.push("--wait".into());
    }
    if opts.dry_run {
        args.push("--dry-run".into());
    }
    args
}

pub(crate) fn repo_add_args(repo: &RepositorySpec) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "repo".into(),
        "add".into(),
        repo.name.as_str().into(),
        repo.url.as_str().into(),
        "--force-update".into(),
    ];
    if repo.has_credentials() {
        args.push("--username".into());
        args.push(repo.username.as_str().into());
        args.push("--password-stdin".into());
    }
    args
}

#[async_trait]
impl PackageManager for HelmCli {
    async fn search(&self, term: &str, all_versions: bool) -> Result<Vec<ChartMatch>> {
        let stdout = self
            .run(
                search_args(term, all_versions),
                None,
                self.config.repository_timeout,
            )
            .await?;
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(trimmed)?)
    }

    async fn release_history(
        &self,
        session: &ClusterSession,
        name: &str,
        namespace: &str,
        max: usize,
    ) -> Result<Vec<ReleaseRevision>> {
        let mut args: Vec<OsString> = vec![
            "history".into(),
            name.into(),
            "--max".into(),
            max.to_string().into(),
            "--output".into(),
            "json".into(),
        ];
        args.extend(cluster_args(session, namespace));

        let stdout = match self.run(args, None, self.config.timeout).await {
            Ok(stdout) => stdout,
            Err(KubeError::ReleaseNotFound { .. }) => {
                return Err(KubeError::ReleaseNotFound {
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        // helm lists oldest first
        let mut history: Vec<ReleaseRevision> = serde_json::from_str(stdout.trim())?;
        history.sort_by(|a, b| b.revision.cmp(&a.revision));
        history.truncate(max);
        for revision in &mut history {
            revision.namespace = Some(namespace.to_string());
        }
        Ok(history)
    }

    async fn install(&self, session: &ClusterSession, options: &InstallOptions) -> Result<()> {
        self.run(install_args(session, options), None, self.config.timeout)
            .await?;
        Ok(())
    }

    async fn upgrade(&self, session: &ClusterSession, options: &UpgradeOptions) -> Result<()> {
        self.run(upgrade_args(session, options), None, self.config.timeout)
            .await?;
        Ok(())
    }

    async fn rollback(&self, session: &ClusterSession, options: &RollbackOptions) -> Result<()> {
        self.run(rollback_args(session, options), None, self.config.timeout)
            .await?;
        Ok(())
    }

    async fn register_repository(&self, repo: &RepositorySpec) -> Result<()> {
        repo.validate()?;
        let _guard = self.registry.lock().await;
        let password = repo.has_credentials().then_some(repo.password.as_str());
        self.run(
            repo_add_args(repo),
            password,
            self.config.repository_timeout,
        )
        .await?;
        tracing::info!(repository = %repo.name, url = %repo.url, "repository registered");
        Ok(())
    }

    async fn remove_repository(&self, name: &str) -> Result<()> {
        let _guard = self.registry.lock().await;
        let args: Vec<OsString> = vec!["repo".into(), "remove".into(), name.into()];
        self.run(args, None, self.config.repository_timeout).await?;
        tracing::info!(repository = %name, "repository removed");
        Ok(())
    }

    async fn update_repositories(&self) -> Result<()> {
        let _guard = self.registry.lock().await;
        let args: Vec<OsString> = vec!["repo".into(), "update".into()];
        self.run(args, None, self.config.repository_timeout).await?;
        Ok(())
    }
}

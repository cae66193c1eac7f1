//! Per-request cluster session
//!
//! Every install request gets its own scratch directory holding the rendered
//! kubeconfig and the merged values file. The directory name is generated, so
//! concurrent requests never share credential files. Dropping the session
//! removes the directory whatever the outcome of the request.

use chartmq_core::Values;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::Result;
use crate::kubeconfig::ClusterTarget;

const KUBECONFIG_FILE: &str = "kubeconfig.yaml";
const VALUES_FILE: &str = "values.json";

/// Scratch directory with the credentials for one request
#[derive(Debug)]
pub struct ClusterSession {
    dir: TempDir,
    kubeconfig: PathBuf,
}

impl ClusterSession {
    /// Create the session directory under `work_dir` and write the kubeconfig
    pub fn open(work_dir: &Path, target: &ClusterTarget, label: &str) -> Result<Self> {
        std::fs::create_dir_all(work_dir)?;
        let dir = tempfile::Builder::new()
            .prefix("release-")
            .tempdir_in(work_dir)?;

        let kubeconfig = dir.path().join(KUBECONFIG_FILE);
        write_private(&kubeconfig, target.render()?.as_bytes())?;

        tracing::debug!(
            session = %dir.path().display(),
            label,
            cluster = %target.name,
            "opened cluster session"
        );

        Ok(Self { dir, kubeconfig })
    }

    /// Write merged override values; empty values leave no file
    pub fn write_values(&self, values: &Values) -> Result<Option<PathBuf>> {
        if values.is_empty() {
            return Ok(None);
        }
        let path = self.dir.path().join(VALUES_FILE);
        values.write_to(&path)?;
        Ok(Some(path))
    }

    /// Path of the generated kubeconfig
    pub fn kubeconfig_path(&self) -> &Path {
        &self.kubeconfig
    }

    /// Session directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true).mode(0o600);
        options.open(path)?.write_all(content)?;
    }

    #[cfg(not(unix))]
    {
        std::fs::write(path, content)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartmq_core::parse_overrides;

    fn target() -> ClusterTarget {
        ClusterTarget {
            name: "dev".to_string(),
            token: "token".to_string(),
            ca_certificate: "CA".to_string(),
            cluster_uri: "https://dev.example.com".to_string(),
            namespace: String::new(),
        }
    }

    #[test]
    fn test_session_writes_and_cleans_up() {
        let work = tempfile::tempdir().unwrap();
        let dir;
        {
            let session = ClusterSession::open(work.path(), &target(), "dev.yaml").unwrap();
            dir = session.path().to_path_buf();
            assert!(session.kubeconfig_path().exists());

            let values = parse_overrides(&["replicas=2"]).unwrap();
            let written = session.write_values(&values).unwrap().unwrap();
            assert!(written.starts_with(&dir));
            assert!(written.exists());
        }
        assert!(!dir.exists());
    }

    #[test]
    fn test_sessions_with_same_label_do_not_collide() {
        let work = tempfile::tempdir().unwrap();
        let a = ClusterSession::open(work.path(), &target(), "shared.yaml").unwrap();
        let b = ClusterSession::open(work.path(), &target(), "shared.yaml").unwrap();
        assert_ne!(a.kubeconfig_path(), b.kubeconfig_path());
    }

    #[test]
    fn test_empty_values_write_nothing() {
        let work = tempfile::tempdir().unwrap();
        let session = ClusterSession::open(work.path(), &target(), "x").unwrap();
        assert!(session.write_values(&Values::new()).unwrap().is_none());
        assert_eq!(std::fs::read_dir(session.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_invalid_target_leaves_no_directory() {
        let work = tempfile::tempdir().unwrap();
        let mut bad = target();
        bad.cluster_uri.clear();
        assert!(ClusterSession::open(work.path(), &bad, "x").is_err());
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_kubeconfig_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let work = tempfile::tempdir().unwrap();
        let session = ClusterSession::open(work.path(), &target(), "x").unwrap();
        let mode = std::fs::metadata(session.kubeconfig_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

//! Release revision records as reported by the package manager

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Status of one release revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReleaseStatus {
    Deployed,
    Failed,
    Superseded,
    Uninstalled,
    Uninstalling,
    PendingInstall,
    PendingUpgrade,
    PendingRollback,
    Unknown(String),
}

impl ReleaseStatus {
    /// Get the status name used by the package manager
    pub fn status_name(&self) -> &str {
        match self {
            Self::Deployed => "deployed",
            Self::Failed => "failed",
            Self::Superseded => "superseded",
            Self::Uninstalled => "uninstalled",
            Self::Uninstalling => "uninstalling",
            Self::PendingInstall => "pending-install",
            Self::PendingUpgrade => "pending-upgrade",
            Self::PendingRollback => "pending-rollback",
            Self::Unknown(other) => other,
        }
    }

    /// An operation is currently in flight for the release
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::PendingInstall | Self::PendingUpgrade | Self::PendingRollback
        )
    }
}

impl From<String> for ReleaseStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "deployed" => Self::Deployed,
            "failed" => Self::Failed,
            "superseded" => Self::Superseded,
            "uninstalled" => Self::Uninstalled,
            "uninstalling" => Self::Uninstalling,
            "pending-install" => Self::PendingInstall,
            "pending-upgrade" => Self::PendingUpgrade,
            "pending-rollback" => Self::PendingRollback,
            _ => Self::Unknown(s),
        }
    }
}

impl From<ReleaseStatus> for String {
    fn from(status: ReleaseStatus) -> Self {
        status.status_name().to_string()
    }
}

impl std::fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.status_name())
    }
}

/// One entry of a release history, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRevision {
    pub revision: u32,

    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated: Option<DateTime<Utc>>,

    pub status: ReleaseStatus,

    #[serde(default)]
    pub chart: String,

    #[serde(default)]
    pub app_version: String,

    #[serde(default)]
    pub description: String,

    /// Namespace the history was read from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ReleaseRevision {
    /// Create a revision record
    pub fn new(revision: u32, status: ReleaseStatus, chart: impl Into<String>) -> Self {
        Self {
            revision,
            updated: Some(Utc::now()),
            status,
            chart: chart.into(),
            app_version: String::new(),
            description: String::new(),
            namespace: None,
        }
    }

    /// Record the namespace the revision belongs to
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// Accept RFC 3339 timestamps and ignore anything else
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_history_json() {
        let json = r#"[
            {"revision":3,"updated":"2024-03-05T10:00:00.123456789+01:00","status":"deployed","chart":"nginx-15.0.0","app_version":"1.25.3","description":"Upgrade complete"},
            {"revision":2,"updated":"garbage","status":"superseded","chart":"nginx-14.2.0","app_version":"1.25.2","description":"Upgrade complete"}
        ]"#;

        let history: Vec<ReleaseRevision> = serde_json::from_str(json).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].revision, 3);
        assert_eq!(history[0].status, ReleaseStatus::Deployed);
        assert!(history[0].updated.is_some());
        assert_eq!(history[1].status, ReleaseStatus::Superseded);
        assert!(history[1].updated.is_none());
    }

    #[test]
    fn test_unknown_status_preserved() {
        let status = ReleaseStatus::from("exploded".to_string());
        assert_eq!(status, ReleaseStatus::Unknown("exploded".to_string()));
        assert_eq!(status.to_string(), "exploded");
    }

    #[test]
    fn test_pending_statuses() {
        assert!(ReleaseStatus::PendingUpgrade.is_pending());
        assert!(!ReleaseStatus::Deployed.is_pending());
    }
}

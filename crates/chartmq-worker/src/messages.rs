//! Wire payloads
//!
//! Producers of install requests serialize the inner upgrade request without
//! field tags, so its keys may arrive capitalised (`Release`, `ChartVersion`).
//! Both spellings are accepted. The result payload keeps the `sucess` key that
//! consumers already depend on.

use chartmq_core::RepositorySpec;
use chartmq_kube::{ClusterTarget, DeployOutcome, DeployRequest};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, WorkerError};

/// The release part of an install message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeRequest {
    /// Unused, kept so producers may still send it
    #[serde(alias = "Kubeconfig")]
    pub kubeconfig: String,
    #[serde(alias = "Release")]
    pub release: String,
    #[serde(alias = "Chart")]
    pub chart: String,
    #[serde(rename = "chartVersion", alias = "ChartVersion", alias = "chart_version")]
    pub chart_version: String,
    #[serde(alias = "Namespace")]
    pub namespace: String,
    /// `key=value` overrides, applied in order
    #[serde(alias = "Variables", deserialize_with = "null_as_default")]
    pub variables: Vec<String>,
    #[serde(alias = "Dryrun", alias = "dryRun")]
    pub dryrun: bool,
    /// Roll back to the previous revision when the upgrade fails
    #[serde(alias = "Atomic")]
    pub atomic: bool,
}

/// A message on the install queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallMessage {
    #[serde(rename = "upgradeRequest")]
    pub upgrade_request: UpgradeRequest,
    /// Cluster name
    pub name: String,
    /// Bearer token for the cluster
    pub token: String,
    /// Label for the credential file
    pub filename: String,
    pub ca_certificate: String,
    pub cluster_uri: String,
    /// Cluster default namespace
    pub namespace: String,
    /// Correlation id echoed in the result
    pub deployment_id: u64,
}

impl InstallMessage {
    /// Parse a raw delivery body
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| WorkerError::protocol("install request", e))
    }

    /// Convert into an orchestrator request
    pub fn into_request(self) -> DeployRequest {
        let upgrade = self.upgrade_request;
        DeployRequest {
            release: upgrade.release,
            chart: upgrade.chart,
            chart_version: upgrade.chart_version,
            namespace: upgrade.namespace,
            overrides: upgrade.variables,
            dry_run: upgrade.dryrun,
            atomic: upgrade.atomic,
            target: ClusterTarget {
                name: self.name,
                token: self.token,
                ca_certificate: self.ca_certificate,
                cluster_uri: self.cluster_uri,
                namespace: self.namespace,
            },
            label: self.filename,
        }
    }
}

/// Pull `deployment_id` out of a body that failed to parse as a whole
pub fn salvage_deployment_id(body: &[u8]) -> u64 {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("deployment_id").and_then(serde_json::Value::as_u64))
        .unwrap_or(0)
}

/// The message published for every install request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallResult {
    #[serde(rename = "sucess")]
    pub success: bool,
    /// Empty on success
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub deployment_id: u64,
}

impl InstallResult {
    pub fn success(deployment_id: u64) -> Self {
        Self {
            success: true,
            error: String::new(),
            deployment_id,
        }
    }

    pub fn failure(deployment_id: u64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            deployment_id,
        }
    }

    /// Result for a finished orchestrator run
    pub fn from_outcome(deployment_id: u64, outcome: &DeployOutcome) -> Self {
        match &outcome.error {
            None => Self::success(deployment_id),
            Some(message) => Self::failure(deployment_id, message.clone()),
        }
    }

    /// JSON body for the result queue
    pub fn to_body(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Parse an add-repository broadcast
pub fn parse_repository(body: &[u8]) -> Result<RepositorySpec> {
    let spec: RepositorySpec = serde_json::from_slice(body)
        .map_err(|e| WorkerError::protocol("add-repository message", e))?;
    spec.validate()
        .map_err(|e| WorkerError::protocol("add-repository message", e))?;
    Ok(spec)
}

/// Parse a delete-repository broadcast into a repository name
///
/// The body is normally a JSON string. Anything else falls back to the raw
/// text with every quote removed.
pub fn parse_delete(body: &[u8]) -> Result<String> {
    let name = match serde_json::from_slice::<String>(body) {
        Ok(name) => name.trim().to_string(),
        Err(_) => String::from_utf8_lossy(body).replace('"', "").trim().to_string(),
    };

    if name.is_empty() {
        return Err(WorkerError::protocol(
            "delete-repository message",
            "repository name is empty",
        ));
    }
    Ok(name)
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_install_lowercase_keys() {
        let body = br#"{
            "upgradeRequest": {
                "release": "r1",
                "chart": "nginx",
                "chartVersion": "1.2.3",
                "namespace": "web",
                "variables": ["replicaCount=2"],
                "dryrun": true
            },
            "name": "prod",
            "token": "abc",
            "filename": "prod-kube",
            "ca_certificate": "CA",
            "cluster_uri": "https://10.0.0.1:6443",
            "namespace": "default",
            "deployment_id": 42
        }"#;

        let msg = InstallMessage::parse(body).unwrap();
        assert_eq!(msg.deployment_id, 42);

        let req = msg.into_request();
        assert_eq!(req.release, "r1");
        assert_eq!(req.chart, "nginx");
        assert_eq!(req.chart_version, "1.2.3");
        assert_eq!(req.namespace, "web");
        assert_eq!(req.overrides, vec!["replicaCount=2"]);
        assert!(req.dry_run);
        assert!(!req.atomic);
        assert_eq!(req.target.cluster_uri, "https://10.0.0.1:6443");
        assert_eq!(req.label, "prod-kube");
    }

    #[test]
    fn test_parse_install_capitalised_keys() {
        let body = br#"{
            "upgradeRequest": {
                "Kubeconfig": "",
                "Release": "r2",
                "Chart": "redis",
                "ChartVersion": "",
                "Namespace": "",
                "Variables": null,
                "Dryrun": false,
                "Atomic": true
            },
            "deployment_id": 7
        }"#;

        let req = InstallMessage::parse(body).unwrap().into_request();
        assert_eq!(req.release, "r2");
        assert_eq!(req.chart, "redis");
        assert!(req.overrides.is_empty());
        assert!(req.atomic);
    }

    #[test]
    fn test_parse_install_missing_fields_default() {
        let msg = InstallMessage::parse(b"{}").unwrap();
        assert_eq!(msg, InstallMessage::default());
    }

    #[test]
    fn test_parse_install_malformed() {
        let err = InstallMessage::parse(br#"{"deployment_id": 9, "upgradeRequest": 3}"#).unwrap_err();
        assert!(err.is_protocol());
        assert!(err.to_string().starts_with("malformed install request: "));
    }

    #[test]
    fn test_salvage_deployment_id() {
        assert_eq!(salvage_deployment_id(br#"{"deployment_id": 9, "upgradeRequest": 3}"#), 9);
        assert_eq!(salvage_deployment_id(br#"{"deployment_id": "x"}"#), 0);
        assert_eq!(salvage_deployment_id(b"not json"), 0);
    }

    #[test]
    fn test_result_keeps_wire_key() {
        let body = InstallResult::failure(3, "Chart does not exists").to_body().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["sucess"], false);
        assert_eq!(json["error"], "Chart does not exists");
        assert_eq!(json["deployment_id"], 3);
        assert!(json.get("success").is_none());
    }

    #[test]
    fn test_result_from_outcome() {
        let ok = DeployOutcome {
            phases: vec![],
            error: None,
        };
        assert_eq!(InstallResult::from_outcome(1, &ok), InstallResult::success(1));

        let failed = DeployOutcome {
            phases: vec![],
            error: Some("boom".to_string()),
        };
        let result = InstallResult::from_outcome(2, &failed);
        assert!(!result.success);
        assert_eq!(result.error, "boom");
    }

    #[test]
    fn test_parse_repository() {
        let spec = parse_repository(
            br#"{"name":"stable","url":"https://charts.example.com","username":"","password":""}"#,
        )
        .unwrap();
        assert_eq!(spec.name, "stable");
        assert!(!spec.has_credentials());

        assert!(parse_repository(b"[1,2]").unwrap_err().is_protocol());
        assert!(parse_repository(br#"{"name":"","url":"https://x"}"#).unwrap_err().is_protocol());
    }

    #[test]
    fn test_parse_delete() {
        assert_eq!(parse_delete(br#""stable""#).unwrap(), "stable");
        assert_eq!(parse_delete(b"stable\n").unwrap(), "stable");
        assert_eq!(parse_delete(br#""bit"nami"#).unwrap(), "bitnami");
        assert!(parse_delete(b"  ").unwrap_err().is_protocol());
        assert!(parse_delete(br#""""#).unwrap_err().is_protocol());
    }
}

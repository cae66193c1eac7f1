//! Kubeconfig rendering for a remote cluster target

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{KubeError, Result};

/// User name written when the token does not carry one
pub const DEFAULT_USER: &str = "cluster-user";

/// Namespace used when a request leaves it empty
pub const DEFAULT_NAMESPACE: &str = "default";

/// Connection descriptor for the cluster an install targets
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterTarget {
    /// Cluster (and context) name
    pub name: String,
    /// Bearer token
    pub token: String,
    /// PEM certificate authority bundle
    pub ca_certificate: String,
    /// API server endpoint
    pub cluster_uri: String,
    /// Namespace for the context
    pub namespace: String,
}

impl ClusterTarget {
    /// Namespace, falling back to `default`
    pub fn effective_namespace(&self) -> &str {
        if self.namespace.trim().is_empty() {
            DEFAULT_NAMESPACE
        } else {
            self.namespace.trim()
        }
    }

    /// User name embedded in rancher style `kubeconfig-<user>:<secret>` tokens
    pub fn user_name(&self) -> &str {
        match self.token.find("kubeconfig-") {
            Some(idx) => {
                let rest = &self.token[idx + "kubeconfig-".len()..];
                let user = rest.split(':').next().unwrap_or_default();
                if user.is_empty() { DEFAULT_USER } else { user }
            }
            None => DEFAULT_USER,
        }
    }

    /// Render the kubeconfig document for this target
    pub fn render(&self) -> Result<String> {
        if self.cluster_uri.trim().is_empty() {
            return Err(KubeError::InvalidTarget("cluster_uri is empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(KubeError::InvalidTarget("cluster name is empty".to_string()));
        }

        let ca = self
            .ca_certificate
            .strip_suffix('\n')
            .unwrap_or(&self.ca_certificate);
        let user = self.user_name().to_string();

        let doc = Kubeconfig {
            api_version: "v1",
            clusters: vec![NamedCluster {
                cluster: Cluster {
                    certificate_authority_data: STANDARD.encode(ca),
                    server: self.cluster_uri.trim().to_string(),
                },
                name: self.name.clone(),
            }],
            contexts: vec![NamedContext {
                context: Context {
                    cluster: self.name.clone(),
                    namespace: self.effective_namespace().to_string(),
                    user: user.clone(),
                },
                name: self.name.clone(),
            }],
            current_context: self.name.clone(),
            kind: "Config",
            preferences: Preferences {},
            users: vec![NamedUser {
                name: user,
                user: User {
                    token: self.token.clone(),
                },
            }],
        };

        Ok(serde_yaml::to_string(&doc)?)
    }
}

impl std::fmt::Debug for ClusterTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterTarget")
            .field("name", &self.name)
            .field("cluster_uri", &self.cluster_uri)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct Kubeconfig {
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
    clusters: Vec<NamedCluster>,
    contexts: Vec<NamedContext>,
    #[serde(rename = "current-context")]
    current_context: String,
    kind: &'static str,
    preferences: Preferences,
    users: Vec<NamedUser>,
}

#[derive(Serialize)]
struct NamedCluster {
    cluster: Cluster,
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct Cluster {
    certificate_authority_data: String,
    server: String,
}

#[derive(Serialize)]
struct NamedContext {
    context: Context,
    name: String,
}

#[derive(Serialize)]
struct Context {
    cluster: String,
    namespace: String,
    user: String,
}

#[derive(Serialize)]
struct Preferences {}

#[derive(Serialize)]
struct NamedUser {
    name: String,
    user: User,
}

#[derive(Serialize)]
struct User {
    token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn target() -> ClusterTarget {
        ClusterTarget {
            name: "prod".to_string(),
            token: "kubeconfig-u-abc123:s3cret".to_string(),
            ca_certificate: "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n"
                .to_string(),
            cluster_uri: "https://k8s.example.com:6443".to_string(),
            namespace: "apps".to_string(),
        }
    }

    #[test]
    fn test_render_shape() {
        let yaml = target().render().unwrap();
        let doc: Value = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(doc["apiVersion"], "v1");
        assert_eq!(doc["kind"], "Config");
        assert_eq!(doc["current-context"], "prod");
        assert!(doc["preferences"].as_mapping().unwrap().is_empty());

        let cluster = &doc["clusters"][0];
        assert_eq!(cluster["name"], "prod");
        assert_eq!(cluster["cluster"]["server"], "https://k8s.example.com:6443");

        let context = &doc["contexts"][0]["context"];
        assert_eq!(context["cluster"], "prod");
        assert_eq!(context["namespace"], "apps");
        assert_eq!(context["user"], "u-abc123");

        let user = &doc["users"][0];
        assert_eq!(user["name"], "u-abc123");
        assert_eq!(user["user"]["token"], "kubeconfig-u-abc123:s3cret");
    }

    #[test]
    fn test_ca_trailing_newline_trimmed_before_encoding() {
        let yaml = target().render().unwrap();
        let doc: Value = serde_yaml::from_str(&yaml).unwrap();
        let encoded = doc["clusters"][0]["cluster"]["certificate-authority-data"]
            .as_str()
            .unwrap();
        let decoded = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert_eq!(
            decoded,
            "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----"
        );
    }

    #[test]
    fn test_user_name_fallback() {
        let mut t = target();
        t.token = "eyJhbGciOi".to_string();
        assert_eq!(t.user_name(), DEFAULT_USER);

        t.token = "prefix.kubeconfig-admin".to_string();
        assert_eq!(t.user_name(), "admin");

        t.token = "kubeconfig-:secret".to_string();
        assert_eq!(t.user_name(), DEFAULT_USER);
    }

    #[test]
    fn test_empty_namespace_defaults() {
        let mut t = target();
        t.namespace = String::new();
        assert_eq!(t.effective_namespace(), "default");
    }

    #[test]
    fn test_missing_endpoint_rejected() {
        let mut t = target();
        t.cluster_uri = " ".to_string();
        assert!(matches!(t.render(), Err(KubeError::InvalidTarget(_))));
    }

    #[test]
    fn test_debug_hides_token() {
        let debug = format!("{:?}", target());
        assert!(!debug.contains("s3cret"));
    }
}

//! Chart name resolution
//!
//! Clients may name a chart informally (`nginx`) or fully (`bitnami/nginx`).
//! The resolver runs one search against the package manager's live index and
//! takes the best hit. Nothing is cached.

use serde::Serialize;
use std::sync::Arc;

use crate::error::{KubeError, Result};
use crate::manager::{ChartMatch, PackageManager};

/// Version constraint meaning "any version, pre-releases included"
pub const ANY_VERSION: &str = ">0.0.0-0";

/// A chart name resolved against the repository index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartReference {
    /// Canonical `repo/chart` name
    pub resolved_name: String,
    /// Latest version found by the search
    pub version: String,
    pub description: String,
}

impl From<ChartMatch> for ChartReference {
    fn from(m: ChartMatch) -> Self {
        Self {
            resolved_name: m.name,
            version: m.version,
            description: m.description,
        }
    }
}

/// Normalize a requested version: empty or `any` means [`ANY_VERSION`]
pub fn version_constraint(requested: &str) -> &str {
    let requested = requested.trim();
    if requested.is_empty() || requested.eq_ignore_ascii_case("any") {
        ANY_VERSION
    } else {
        requested
    }
}

/// Resolves chart names through the package manager search index
#[derive(Clone)]
pub struct ChartResolver {
    manager: Arc<dyn PackageManager>,
}

impl ChartResolver {
    /// Create a resolver over a package manager
    pub fn new(manager: Arc<dyn PackageManager>) -> Self {
        Self { manager }
    }

    /// Resolve a chart name to its best match
    pub async fn resolve(&self, name: &str) -> Result<ChartReference> {
        let term = name.trim();
        if term.is_empty() {
            return Err(KubeError::ChartNotFound {
                name: name.to_string(),
            });
        }

        let matches = self.manager.search(term, false).await?;
        let best = matches
            .into_iter()
            .next()
            .ok_or_else(|| KubeError::ChartNotFound {
                name: term.to_string(),
            })?;

        tracing::debug!(requested = %term, resolved = %best.name, version = %best.version, "chart resolved");
        Ok(best.into())
    }

    /// List the charts published by one repository
    pub async fn list_repository(&self, repo: &str, all_versions: bool) -> Result<Vec<ChartMatch>> {
        let prefix = format!("{}/", repo.trim_end_matches('/'));
        let matches = self.manager.search(&prefix, all_versions).await?;
        Ok(matches
            .into_iter()
            .filter(|m| m.name.starts_with(&prefix))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPackageManager;

    fn resolver() -> ChartResolver {
        let pm = MockPackageManager::new().with_charts(vec![
            ChartMatch::new("bitnami/nginx", "15.0.0").with_description("NGINX web server"),
            ChartMatch::new("bitnami/nginx", "14.0.0"),
            ChartMatch::new("stable/nginx-ingress", "1.41.3"),
            ChartMatch::new("stable/redis", "10.5.7"),
        ]);
        ChartResolver::new(Arc::new(pm))
    }

    #[tokio::test]
    async fn test_resolve_takes_first_match() {
        let chart = resolver().resolve("nginx").await.unwrap();
        assert_eq!(chart.resolved_name, "bitnami/nginx");
        assert_eq!(chart.version, "15.0.0");
        assert_eq!(chart.description, "NGINX web server");
    }

    #[tokio::test]
    async fn test_resolve_missing_chart() {
        let err = resolver().resolve("missing-chart").await.unwrap_err();
        assert!(matches!(err, KubeError::ChartNotFound { .. }));
        assert_eq!(err.to_string(), "Chart does not exists");
    }

    #[tokio::test]
    async fn test_resolve_blank_name() {
        assert!(resolver().resolve("  ").await.is_err());
    }

    #[tokio::test]
    async fn test_list_repository_filters_prefix() {
        let charts = resolver().list_repository("stable", false).await.unwrap();
        let names: Vec<_> = charts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["stable/nginx-ingress", "stable/redis"]);

        let all = resolver().list_repository("bitnami", true).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_version_constraint() {
        assert_eq!(version_constraint(""), ANY_VERSION);
        assert_eq!(version_constraint("any"), ANY_VERSION);
        assert_eq!(version_constraint(" 1.2.3 "), "1.2.3");
    }
}

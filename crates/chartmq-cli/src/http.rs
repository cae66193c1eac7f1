//! HTTP surface: health, chart listing and a repository refresh trigger

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chartmq_kube::{ChartMatch, ChartResolver, PackageManager};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    manager: Arc<dyn PackageManager>,
    resolver: ChartResolver,
}

impl AppState {
    pub fn new(manager: Arc<dyn PackageManager>) -> Self {
        Self {
            resolver: ChartResolver::new(Arc::clone(&manager)),
            manager,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChartSummary {
    pub name: String,
    pub chart_version: String,
    pub app_version: String,
    pub description: String,
}

impl From<ChartMatch> for ChartSummary {
    fn from(m: ChartMatch) -> Self {
        Self {
            name: m.name,
            chart_version: m.version,
            app_version: m.app_version,
            description: m.description,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChartsResponse {
    pub charts: Vec<ChartSummary>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChartsQuery {
    #[serde(default)]
    pub all: bool,
}

/// Package manager failure rendered as `{"error": ...}`
pub struct ApiError(chartmq_kube::KubeError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/charts/:repo", get(list_charts))
        .route("/repoUpdate", get(update_repositories))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn list_charts(
    State(state): State<AppState>,
    Path(repo): Path<String>,
    Query(query): Query<ChartsQuery>,
) -> Result<Json<ChartsResponse>, ApiError> {
    let charts = state
        .resolver
        .list_repository(&repo, query.all)
        .await
        .map_err(ApiError)?;
    Ok(Json(ChartsResponse {
        charts: charts.into_iter().map(ChartSummary::from).collect(),
    }))
}

async fn update_repositories(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    state.manager.update_repositories().await.map_err(ApiError)?;
    tracing::info!("repository indexes updated over http");
    Ok(Json(serde_json::json!({ "status": "updated" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chartmq_core::RepositorySpec;
    use chartmq_kube::MockPackageManager;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn app(pm: MockPackageManager) -> Router {
        router(AppState::new(Arc::new(pm)))
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(app(MockPackageManager::new()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_list_charts() {
        let pm = MockPackageManager::new().with_charts(vec![
            ChartMatch::new("stable/redis", "10.5.7").with_description("Redis"),
            ChartMatch::new("stable/redis", "10.5.6"),
            ChartMatch::new("bitnami/nginx", "15.0.0"),
        ]);

        let (status, body) = get_json(app(pm.clone()), "/charts/stable").await;
        assert_eq!(status, StatusCode::OK);
        let charts = body["charts"].as_array().unwrap();
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0]["name"], "stable/redis");
        assert_eq!(charts[0]["chartVersion"], "10.5.7");
        assert_eq!(charts[0]["description"], "Redis");

        let (_, body) = get_json(app(pm), "/charts/stable?all=true").await;
        assert_eq!(body["charts"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_repo_update() {
        let pm = MockPackageManager::new()
            .with_repository(RepositorySpec::new("stable", "https://charts.helm.sh/stable"));
        let (status, body) = get_json(app(pm.clone()), "/repoUpdate").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "updated");
        assert_eq!(pm.operation_counts().updates, 1);
    }

    #[tokio::test]
    async fn test_repo_update_failure() {
        let pm = MockPackageManager::new().fail_update("connection refused");
        let (status, body) = get_json(app(pm), "/repoUpdate").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("connection refused"));
    }
}

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use crate::http_server::api::client::{endpoint, ApiRequest};
use crate::ServiceState;

pub const STATUS_OK: &str = "ok";
pub const STATUS_DEGRADED: &str = "degraded";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyzRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyzResponse {
    /// "ok" when every watcher is healthy, "degraded" otherwise
    pub status: String,
    /// Watcher status per namespace
    pub watchers: BTreeMap<String, String>,
    /// Cached listing size per namespace
    pub files: BTreeMap<String, usize>,
}

impl ReadyzResponse {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

impl ApiRequest for ReadyzRequest {
    type Response = ReadyzResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.get(endpoint(base_url, "/_status/readyz"))
    }
}

/// Reports watcher health. Always 200: a degraded watcher still serves the
/// last good listing, so the service stays in rotation.
#[tracing::instrument(skip_all)]
pub async fn handler(State(state): State<ServiceState>) -> Response {
    let mut healthy = true;
    let mut watchers = BTreeMap::new();
    let mut files = BTreeMap::new();

    for (name, status) in state.watcher_statuses() {
        let described = match status {
            Some(status) => {
                healthy &= status.is_healthy();
                status.to_string()
            }
            None => {
                healthy = false;
                "not running".to_string()
            }
        };
        files.insert(name.clone(), state.cache().count(&name));
        watchers.insert(name, described);
    }

    let status = if healthy { STATUS_OK } else { STATUS_DEGRADED };
    if !healthy {
        tracing::debug!(?watchers, "Readiness degraded");
    }

    (
        StatusCode::OK,
        Json(ReadyzResponse {
            status: status.to_string(),
            watchers,
            files,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service_config::{Config, NamespaceConfig};

    async fn state_for(dir: &std::path::Path) -> ServiceState {
        let config = Config::new(
            "127.0.0.1:0".parse().unwrap(),
            vec![NamespaceConfig::new(
                "gary",
                dir,
                Url::parse("http://localhost/Gary").unwrap(),
                "Gary76.jpg",
            )],
        );
        ServiceState::from_config(&config).await.unwrap()
    }

    async fn readyz(state: ServiceState) -> ReadyzResponse {
        let response = handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_without_watchers_is_degraded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.jpg"), b"a").unwrap();
        let state = state_for(dir.path()).await;

        let body = readyz(state).await;
        assert!(!body.is_ok());
        assert_eq!(body.watchers["gary"], "not running");
        assert_eq!(body.files["gary"], 1);
    }

    #[tokio::test]
    async fn test_watching_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(dir.path()).await;
        state.spawn_watchers().unwrap();

        // The directory is subscribed before spawn returns.
        let body = readyz(state.clone()).await;
        assert!(body.is_ok(), "unexpected readiness: {:?}", body);
        assert_eq!(body.watchers["gary"], "watching");

        state.stop_watchers().await;
    }

    #[tokio::test]
    async fn test_missing_directory_is_degraded_but_200() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(&dir.path().join("missing")).await;
        state.spawn_watchers().unwrap();

        let body = readyz(state.clone()).await;
        assert_eq!(body.status, STATUS_DEGRADED);
        assert_eq!(body.files["gary"], 0);

        state.stop_watchers().await;
    }
}

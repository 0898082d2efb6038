use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::extract_leading_number;

use super::NamespaceState;
use crate::http_server::api::client::{endpoint, ApiRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlRequest {
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlResponse {
    pub url: String,
    /// First run of digits in the file name, 0 if none
    pub number: u64,
}

impl ApiRequest for UrlRequest {
    type Response = UrlResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.get(endpoint(base_url, &self.namespace))
    }
}

#[tracing::instrument(skip_all)]
pub async fn handler(State(ns): State<NamespaceState>) -> Response {
    let picked = ns.pick();
    let file = picked.name();

    (
        StatusCode::OK,
        Json(UrlResponse {
            url: ns.namespace.public_url(file),
            number: extract_leading_number(file),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service_config::{Config, NamespaceConfig};
    use crate::ServiceState;

    async fn ns_state(dir: &std::path::Path, base: &str) -> NamespaceState {
        let namespace =
            NamespaceConfig::new("gary", dir, Url::parse(base).unwrap(), "Gary76.jpg");
        let config = Config::new("127.0.0.1:0".parse().unwrap(), vec![namespace.clone()]);
        let state = ServiceState::from_config(&config).await.unwrap();
        NamespaceState::new(state, namespace)
    }

    async fn call(ns: NamespaceState) -> UrlResponse {
        let response = handler(State(ns)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_single_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Gary12.png"), b"x").unwrap();
        let ns = ns_state(dir.path(), "http://h/Gary").await;

        let body = call(ns).await;
        assert_eq!(body.url, "http://h/Gary/Gary12.png");
        assert_eq!(body.number, 12);
    }

    #[tokio::test]
    async fn test_empty_directory_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let ns = ns_state(dir.path(), "http://h/Gary/").await;

        let body = call(ns).await;
        assert_eq!(body.url, "http://h/Gary/Gary76.jpg");
        assert_eq!(body.number, 76);
    }

    #[tokio::test]
    async fn test_no_digits_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("noDigits.jpg"), b"x").unwrap();
        let ns = ns_state(dir.path(), "http://h/Gary").await;

        assert_eq!(call(ns).await.number, 0);
    }
}

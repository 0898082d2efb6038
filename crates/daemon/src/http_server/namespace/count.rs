use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use super::NamespaceState;
use crate::http_server::api::client::{endpoint, ApiRequest};
use crate::service_config::CountMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountRequest {
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}

impl ApiRequest for CountRequest {
    type Response = CountResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.get(endpoint(base_url, &format!("{}/count", self.namespace)))
    }
}

#[tracing::instrument(skip_all)]
pub async fn handler(State(ns): State<NamespaceState>) -> Response {
    let cache = ns.state.cache().clone();
    let name = ns.name().to_string();

    let count = match ns.state.config().count_mode {
        CountMode::Cached => cache.count(&name),
        CountMode::Live => {
            let scanner = cache.clone();
            let scanned = name.clone();
            match tokio::task::spawn_blocking(move || scanner.live_count(&scanned)).await {
                Ok(Ok(count)) => count,
                Ok(Err(e)) => {
                    tracing::warn!(
                        namespace = %name,
                        "Live count failed, using cached count: {}",
                        e
                    );
                    cache.count(&name)
                }
                Err(e) => {
                    tracing::error!(namespace = %name, "Live count task failed: {}", e);
                    cache.count(&name)
                }
            }
        }
    };

    (StatusCode::OK, Json(CountResponse { count })).into_response()
}

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::ImageCacheStats;

use crate::http_server::api::client::{endpoint, ApiRequest};
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub requests: u64,
    pub average_response_micros: f64,
    pub requests_per_second: f64,
    pub uptime_secs: u64,
    pub image_cache: ImageCacheStats,
}

impl ApiRequest for MetricsRequest {
    type Response = MetricsResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.get(endpoint(base_url, "/_status/metrics"))
    }
}

pub async fn handler(State(state): State<ServiceState>) -> Response {
    let metrics = state.metrics();
    Json(MetricsResponse {
        requests: metrics.requests(),
        average_response_micros: metrics.average_response_micros(),
        requests_per_second: metrics.requests_per_second(),
        uptime_secs: metrics.uptime().as_secs(),
        image_cache: state.images().stats(),
    })
    .into_response()
}

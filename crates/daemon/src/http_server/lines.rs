//! `GET /quote` and `GET /joke`

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::{LineError, LineStore};

use crate::http_server::api::client::{endpoint, ApiRequest};
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub quote: String,
}

impl ApiRequest for QuoteRequest {
    type Response = QuoteResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.get(endpoint(base_url, "/quote"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JokeRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JokeResponse {
    pub joke: String,
}

impl ApiRequest for JokeRequest {
    type Response = JokeResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.get(endpoint(base_url, "/joke"))
    }
}

#[tracing::instrument(skip_all)]
pub async fn quote_handler(State(state): State<ServiceState>) -> Result<Response, LinesError> {
    let store = state.quotes().ok_or(LinesError::NotConfigured("quotes"))?;
    let quote = random_line(store.clone()).await?;
    Ok((StatusCode::OK, Json(QuoteResponse { quote })).into_response())
}

#[tracing::instrument(skip_all)]
pub async fn joke_handler(State(state): State<ServiceState>) -> Result<Response, LinesError> {
    let store = state.jokes().ok_or(LinesError::NotConfigured("jokes"))?;
    let joke = random_line(store.clone()).await?;
    Ok((StatusCode::OK, Json(JokeResponse { joke })).into_response())
}

async fn random_line(store: LineStore) -> Result<String, LinesError> {
    let line = tokio::task::spawn_blocking(move || store.random_line()).await??;
    Ok(line)
}

#[derive(Debug, thiserror::Error)]
pub enum LinesError {
    #[error("no {0} file configured")]
    NotConfigured(&'static str),
    #[error(transparent)]
    Line(#[from] LineError),
    #[error("line task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for LinesError {
    fn into_response(self) -> Response {
        let status = match self {
            LinesError::NotConfigured(_) => StatusCode::NOT_FOUND,
            LinesError::Line(_) | LinesError::Task(_) => {
                tracing::error!("Failed to serve line: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

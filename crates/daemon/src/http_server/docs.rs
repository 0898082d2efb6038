//! `GET /`: static HTML documentation page

use axum::extract::State;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use http::StatusCode;

use crate::ServiceState;

/// Serve the configured docs file. Read on every request so edits show up
/// without a restart.
#[tracing::instrument(skip_all)]
pub async fn handler(State(state): State<ServiceState>) -> Result<Response, DocsError> {
    let path = state
        .config()
        .docs_file
        .as_ref()
        .ok_or(DocsError::NotConfigured)?;
    let html = tokio::fs::read_to_string(path).await?;
    Ok(Html(html).into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum DocsError {
    #[error("no docs file configured")]
    NotConfigured,
    #[error("failed to read docs file: {0}")]
    Read(#[from] std::io::Error),
}

impl IntoResponse for DocsError {
    fn into_response(self) -> Response {
        let status = match self {
            DocsError::NotConfigured => StatusCode::NOT_FOUND,
            DocsError::Read(_) => {
                tracing::error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(serde_json::json!({"error": "Documentation unavailable"})),
        )
            .into_response()
    }
}

use std::path::{Path, PathBuf};

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::{header, StatusCode};

use common::Picked;

use super::NamespaceState;

/// Serve the bytes of a random image.
///
/// A listed file that vanished before it could be read is replaced by the
/// fallback. Only when the fallback is unreadable too does this answer 404.
#[tracing::instrument(skip_all)]
pub async fn handler(State(ns): State<NamespaceState>) -> Result<Response, ImageError> {
    let fallback = ns.namespace.fallback_path();

    match ns.pick() {
        Picked::Listed(name) => {
            let path = ns.namespace.dir.join(&name);
            match read_image(&ns, &path).await {
                Ok(response) => Ok(response),
                Err(e) => {
                    tracing::warn!(
                        namespace = %ns.name(),
                        "Listed image unreadable, serving fallback: {}",
                        e
                    );
                    read_image(&ns, &fallback).await
                }
            }
        }
        Picked::Fallback(_) => read_image(&ns, &fallback).await,
    }
}

async fn read_image(ns: &NamespaceState, path: &Path) -> Result<Response, ImageError> {
    let bytes = ns
        .state
        .images()
        .load(path)
        .await
        .map_err(|source| ImageError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image unreadable: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IntoResponse for ImageError {
    fn into_response(self) -> Response {
        tracing::error!("{}", self);
        match self {
            ImageError::Unreadable { .. } => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "Image not found"})),
            )
                .into_response(),
        }
    }
}

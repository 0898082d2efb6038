//! Typed client for the service's own HTTP endpoints
//!
//! Every endpoint that the CLI or tests talk to defines a request type next
//! to its handler and implements [`ApiRequest`] for it.

#[allow(clippy::module_inception)]
mod client;
mod error;

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

pub use client::ApiClient;
pub use error::ApiError;

pub trait ApiRequest {
    type Response: DeserializeOwned;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder;
}

/// Absolute URL for `path` under `base_url`, keeping any base path prefix.
pub fn endpoint(base_url: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_paths() {
        let base = Url::parse("http://localhost:8080").unwrap();
        assert_eq!(endpoint(&base, "/gary"), "http://localhost:8080/gary");

        let prefixed = Url::parse("http://proxy.test/api/").unwrap();
        assert_eq!(
            endpoint(&prefixed, "/_status/livez"),
            "http://proxy.test/api/_status/livez"
        );
    }
}

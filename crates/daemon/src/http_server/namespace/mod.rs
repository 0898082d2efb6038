//! Per-namespace routes, nested under `/{namespace}`
//!
//! - `GET /{namespace}`: random public URL and its leading number
//! - `GET /{namespace}/image[/*any]`: random image bytes
//! - `GET /{namespace}/count`: number of files

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use common::Picked;

use crate::service_config::NamespaceConfig;
use crate::ServiceState;

mod count;
mod image;
mod url;

pub use self::count::{CountRequest, CountResponse};
pub use self::url::{UrlRequest, UrlResponse};

/// Handler state: the service state plus the namespace being served.
#[derive(Clone)]
pub struct NamespaceState {
    state: ServiceState,
    namespace: Arc<NamespaceConfig>,
}

impl NamespaceState {
    pub fn new(state: ServiceState, namespace: NamespaceConfig) -> Self {
        Self {
            state,
            namespace: Arc::new(namespace),
        }
    }

    pub fn name(&self) -> &str {
        &self.namespace.name
    }

    /// Random pick from the cached listing, or the fallback.
    fn pick(&self) -> Picked {
        self.state
            .cache()
            .pick(self.name())
            .unwrap_or_else(|| Picked::Fallback(self.namespace.fallback.clone()))
    }
}

pub fn router(state: ServiceState, namespace: NamespaceConfig) -> Router<ServiceState> {
    Router::new()
        .route("/", get(url::handler))
        .route("/image", get(image::handler))
        .route("/image/*any", get(image::handler))
        .route("/count", get(count::handler))
        .with_state(NamespaceState::new(state, namespace))
}

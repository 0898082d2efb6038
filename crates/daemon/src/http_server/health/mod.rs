use axum::routing::get;
use axum::Router;

use crate::ServiceState;

pub mod liveness;
pub mod metrics;
pub mod readiness;
pub mod version;

pub use liveness::{LivezRequest, LivezResponse};
pub use metrics::{MetricsRequest, MetricsResponse};
pub use readiness::{ReadyzRequest, ReadyzResponse};
pub use version::VersionRequest;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/livez", get(liveness::handler))
        .route("/readyz", get(readiness::handler))
        .route("/version", get(version::handler))
        .route("/metrics", get(metrics::handler))
        .with_state(state)
}

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::ServiceState;

pub mod api;
pub mod docs;
pub mod health;
pub mod lines;
pub mod metrics;
pub mod namespace;

/// Build the full application router.
///
/// Optional routes (`/quote`, `/joke`, `/`) are only mounted when their
/// file is configured, so a disabled route answers 404.
pub fn router(state: ServiceState) -> Router {
    let config = state.config();

    let mut router = Router::new().nest("/_status", health::router(state.clone()));

    for ns in &config.namespaces {
        let routes = namespace::router(state.clone(), ns.clone());
        router = router
            .nest(&format!("/{}", ns.name), routes)
            .nest_service(&ns.static_prefix, ServeDir::new(&ns.dir));
    }

    if config.quotes_file.is_some() {
        router = router.route("/quote", get(lines::quote_handler));
    }
    if config.jokes_file.is_some() {
        router = router.route("/joke", get(lines::joke_handler));
    }
    if config.docs_file.is_some() {
        router = router.route("/", get(docs::handler));
    }

    router
        .layer(middleware::from_fn_with_state(state.clone(), metrics::track))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (unauthenticated, for load balancers/probes)
        .route("/health", get(handlers::health_check))
        // Dictionary lookups
        .route("/cpes/{vendor}/{product}", get(handlers::get_cpes))
        .route("/vendor-products", get(handlers::list_vendor_products))
        .route("/deprecated/{cpe_uri}", get(handlers::get_deprecated))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

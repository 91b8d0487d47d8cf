//! API layer for the refactor function.
//!
//! Routes:
//! - `/`        the function endpoint (OPTIONS preflight, POST submission)
//! - `/health`  liveness and configuration status
//! - `/metrics` Prometheus metrics

pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{any, get},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::core::{request_id_middleware, with_cors_headers, MetricsMiddleware};

pub use handlers::{
    extract_abap_code, health, metrics_handler, refactor_abap, AppState, ABAP_CODE_FIELD,
};

/// Build the router with all endpoints and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/", any(refactor_abap))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(MetricsMiddleware::track_metrics))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state);

    with_cors_headers(router).layer(TraceLayer::new_for_http())
}

//! Operational endpoints: liveness, detailed health and gateway introspection.
//!
//! These never pass through the identity check and never touch the breakers.

pub mod handlers;

use axum::{routing::get, Router};

use self::handlers::*;
use crate::http::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(health_detailed))
        .route("/gateway/info", get(gateway_info))
        .route("/gateway/services", get(gateway_services))
}

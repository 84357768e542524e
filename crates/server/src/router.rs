//! HTTP router construction.

use std::sync::Arc;

use axum::routing::{get, patch};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api;
use crate::state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health::health))
        .route(
            "/api/v1/analytics/jobs",
            get(api::analytics::list).post(api::analytics::create),
        )
        .route(
            "/api/v1/analytics/jobs/{id}",
            get(api::analytics::get).delete(api::analytics::delete),
        )
        .route(
            "/api/v1/reports",
            get(api::reports::list).post(api::reports::create),
        )
        .route(
            "/api/v1/reports/{id}",
            get(api::reports::get).delete(api::reports::delete),
        )
        .route("/api/v1/reports/{id}/download", get(api::reports::download))
        .route("/api/v1/alerts", get(api::alerts::list))
        .route("/api/v1/alerts/summary", get(api::alerts::summary))
        .route("/api/v1/alerts/{id}", get(api::alerts::get))
        .route("/api/v1/alerts/{id}/resolve", patch(api::alerts::resolve))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

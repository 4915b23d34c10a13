//! HTTP handlers for DCA Sentinel

mod health;

pub use health::*;

use crate::metrics::{metrics_router, MetricsState};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// `/health` and `/metrics`
pub fn build_router(state: Arc<AppState>, metrics: Arc<MetricsState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
        .merge(metrics_router().with_state(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

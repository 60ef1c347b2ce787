pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::liveness_handler))
        // Analysis API
        .route("/api/v1/health", get(health::health_handler))
        .route("/api/v1/analyze", post(handlers::handle_analyze))
        .route(
            "/api/v1/analyses/recent",
            get(handlers::handle_recent_analyses),
        )
        .route("/api/v1/analyses/:id", get(handlers::handle_get_analysis))
        .route("/api/v1/usage", get(handlers::handle_token_usage))
        .with_state(state)
}

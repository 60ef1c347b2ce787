use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::prompts;
use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version.
pub async fn liveness_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "sifter-api"
    }))
}

/// GET /api/v1/health
/// Adds the per-vendor configuration status and registered prompt versions.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "providers": state.providers.health(),
        "prompt_versions": prompts::available_versions()
    }))
}

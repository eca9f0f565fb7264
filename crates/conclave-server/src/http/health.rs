use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /health — liveness probe (ambient addition, grounded on the
/// teacher's own `/health` route; not in the distilled spec's endpoint
/// list but excluded by no Non-goal).
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "providers": state.providers.keys().collect::<Vec<_>>(),
    }))
}

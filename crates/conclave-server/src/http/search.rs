//! Full-text search over indexed message history (§4.4, §6.2).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::app::AppState;
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub max_id: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

/// POST /api/search
pub async fn search(State(state): State<Arc<AppState>>, Json(req): Json<SearchRequest>) -> ApiResult<Json<serde_json::Value>> {
    let page = state.messages.search(&req.query, req.max_id, req.limit)?;
    Ok(Json(serde_json::json!({
        "hits": page.hits,
        "hasMore": page.has_more,
        "nextMaxId": page.next_max_id,
    })))
}

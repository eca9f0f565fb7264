//! MCP server config CRUD (§4.5, §6.2). Registering/unregistering a live
//! connection with the tool registry happens lazily the next time a turn
//! builds its tool list, keyed off `enabled`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use conclave_sessions::McpConfig;

use crate::app::AppState;
use crate::error::ApiResult;

/// GET /api/mcp/configs
pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<McpConfig>>> {
    Ok(Json(state.sessions.list_mcp_configs()?))
}

#[derive(Deserialize)]
pub struct UpsertMcpConfigRequest {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// POST /api/mcp/configs
pub async fn upsert(State(state): State<Arc<AppState>>, Json(req): Json<UpsertMcpConfigRequest>) -> ApiResult<Json<serde_json::Value>> {
    state.sessions.upsert_mcp_config(&req.name, &req.command, &req.args, req.enabled)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

/// DELETE /api/mcp/configs/{name}
pub async fn remove(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> ApiResult<Json<serde_json::Value>> {
    state.sessions.delete_mcp_config(&name)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

//! System prompt templates, model/account/workspace introspection (§4.2,
//! §4.8, §6.2). Model and account listings are derived straight from
//! `ConclaveConfig` — no secrets (API keys, OAuth credential paths) are
//! echoed back.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use conclave_sessions::PromptTemplate;

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};

/// GET /api/systemPrompts
pub async fn list_prompts(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<PromptTemplate>>> {
    Ok(Json(state.sessions.list_prompts()?))
}

#[derive(Deserialize)]
pub struct UpsertPromptRequest {
    pub name: String,
    pub template: String,
}

/// POST /api/systemPrompts
pub async fn upsert_prompt(State(state): State<Arc<AppState>>, Json(req): Json<UpsertPromptRequest>) -> ApiResult<Json<serde_json::Value>> {
    state.sessions.upsert_prompt(&req.name, &req.template)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

/// DELETE /api/systemPrompts/{name}
pub async fn delete_prompt(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> ApiResult<Json<serde_json::Value>> {
    state.sessions.delete_prompt(&name)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Serialize)]
pub struct ModelSummary {
    pub id: String,
    pub provider: &'static str,
}

/// GET /api/models — every model this server is configured to reach.
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<Vec<ModelSummary>> {
    let mut models = Vec::new();
    if state.config.providers.gemini.is_some() {
        for id in ["gemini-2.5-pro", "gemini-2.5-flash"] {
            models.push(ModelSummary { id: id.to_string(), provider: "gemini" });
        }
    }
    for entry in &state.config.providers.openai_compat {
        models.push(ModelSummary {
            id: entry.model.clone().unwrap_or_else(|| entry.id.clone()),
            provider: "openai",
        });
    }
    Json(models)
}

#[derive(Serialize)]
pub struct AccountSummary {
    pub id: String,
    pub kind: &'static str,
}

/// GET /api/accounts — configured credential identities, with secrets
/// stripped.
pub async fn list_accounts(State(state): State<Arc<AppState>>) -> Json<Vec<AccountSummary>> {
    let mut accounts = Vec::new();
    if let Some(gemini) = &state.config.providers.gemini {
        for account in &gemini.accounts {
            accounts.push(AccountSummary { id: account.id.clone(), kind: "gemini-oauth" });
        }
    }
    for entry in &state.config.providers.openai_compat {
        accounts.push(AccountSummary { id: entry.id.clone(), kind: "openai-api-key" });
    }
    Json(accounts)
}

#[derive(Serialize)]
pub struct AccountDetails {
    pub id: String,
    pub kind: &'static str,
    pub base_url: String,
}

/// GET /api/accounts/{id}/details
pub async fn account_details(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Json<AccountDetails>> {
    if let Some(gemini) = &state.config.providers.gemini {
        if gemini.accounts.iter().any(|a| a.id == id) {
            return Ok(Json(AccountDetails { id, kind: "gemini-oauth", base_url: gemini.base_url.clone() }));
        }
    }
    if let Some(entry) = state.config.providers.openai_compat.iter().find(|e| e.id == id) {
        return Ok(Json(AccountDetails { id, kind: "openai-api-key", base_url: entry.base_url.clone() }));
    }
    Err(ApiError(conclave_core::ConclaveError::NotFound(format!("account {id}"))))
}

/// GET /api/workspaces
pub async fn list_workspaces(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<conclave_sessions::Workspace>>> {
    Ok(Json(state.sessions.list_workspaces()?))
}

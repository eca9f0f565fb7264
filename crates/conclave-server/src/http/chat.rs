//! Session/branch/message CRUD and the SSE-streamed Turn engine operations
//! (§4.9, §6.2).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use conclave_store::FileAttachment;

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use crate::sse::stream_response;

#[derive(Deserialize)]
pub struct StartSessionRequest {
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default = "default_workspace")]
    pub workspace_id: String,
    pub model: String,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<FileAttachment>,
}

fn default_workspace() -> String {
    "default".to_string()
}

/// POST /api/chat — start a new session and send its first message.
/// The new `sessionId`/`branchId` are returned as response headers since the
/// body is immediately handed over to the SSE stream.
pub async fn start_session(State(state): State<Arc<AppState>>, Json(req): Json<StartSessionRequest>) -> ApiResult<Response> {
    let (session_id, branch_id, subscriber) = state
        .engine
        .start_new_session_and_send(&req.system_prompt, &req.workspace_id, &req.model, &req.text, req.attachments)
        .await
        .map_err(ApiError::from)?;

    let mut response = stream_response(subscriber);
    response.headers_mut().insert("x-session-id", session_id.parse().unwrap());
    response.headers_mut().insert("x-branch-id", branch_id.to_string().parse().unwrap());
    Ok(response)
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub session_id: String,
    pub branch_id: i64,
    pub model: String,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<FileAttachment>,
}

/// POST /api/chat/message — send a new user message on an existing branch.
pub async fn send_message(State(state): State<Arc<AppState>>, Json(req): Json<SendMessageRequest>) -> ApiResult<Response> {
    let subscriber = state
        .engine
        .send(&req.session_id, req.branch_id, &req.model, &req.text, req.attachments)
        .await?;
    Ok(stream_response(subscriber))
}

#[derive(Deserialize)]
pub struct ConfirmRequest {
    pub confirmed: bool,
    #[serde(default)]
    pub modified_data: Option<serde_json::Value>,
}

/// POST /api/chat/{sessionId}/branch/{branchId}/confirm
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Path((session_id, branch_id)): Path<(String, i64)>,
    Json(req): Json<ConfirmRequest>,
) -> ApiResult<Response> {
    let subscriber = state.engine.confirm(&session_id, branch_id, req.confirmed, req.modified_data).await?;
    Ok(stream_response(subscriber))
}

#[derive(Deserialize)]
pub struct RetryQuery {
    #[serde(default)]
    pub retry: Option<u8>,
}

#[derive(Deserialize)]
pub struct NewBranchRequest {
    pub branch_id: i64,
    pub model: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub edit_message_id: Option<i64>,
    #[serde(default)]
    pub attachments: Vec<FileAttachment>,
}

/// POST /api/chat/{sessionId}/branch[?retry=1]
///
/// Three shapes share this route: `retry=1` regenerates the last assistant
/// reply on a fresh branch with no new user message; a body with
/// `editMessageId` forks at that message's parent and replaces it;
/// otherwise a plain fork-and-send starts a new branch at the current tip.
pub async fn new_branch(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(q): Query<RetryQuery>,
    Json(req): Json<NewBranchRequest>,
) -> ApiResult<Response> {
    if q.retry == Some(1) {
        let (_new_branch_id, subscriber) = state.engine.retry(&session_id, req.branch_id, &req.model).await?;
        return Ok(stream_response(subscriber));
    }
    if let Some(message_id) = req.edit_message_id {
        let text = req.text.ok_or_else(|| ApiError(conclave_core::ConclaveError::BadRequest("edit requires text".to_string())))?;
        let (_new_branch_id, subscriber) = state
            .engine
            .edit(&session_id, req.branch_id, message_id, &req.model, &text, req.attachments)
            .await?;
        return Ok(stream_response(subscriber));
    }
    let text = req.text.ok_or_else(|| ApiError(conclave_core::ConclaveError::BadRequest("branch requires text".to_string())))?;
    let new_branch_id = state.sessions.fork_branch(&session_id, req.branch_id, None)?;
    let subscriber = state.engine.send(&session_id, new_branch_id, &req.model, &text, req.attachments).await?;
    Ok(stream_response(subscriber))
}

#[derive(Deserialize)]
pub struct RetryErrorRequest {
    pub model: String,
}

/// POST /api/chat/{sessionId}/branch/{branchId}/retry-error
pub async fn retry_error(
    State(state): State<Arc<AppState>>,
    Path((session_id, branch_id)): Path<(String, i64)>,
    Json(req): Json<RetryErrorRequest>,
) -> ApiResult<Response> {
    let subscriber = state.engine.error_retry(&session_id, branch_id, &req.model).await?;
    Ok(stream_response(subscriber))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub primary_branch_id: Option<i64>,
    pub before_message_id: Option<i64>,
    pub fetch_limit: Option<i64>,
}

/// GET /api/chat/{sessionId}?primaryBranchId=&beforeMessageId=&fetchLimit=
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let session = state.sessions.get_session(&session_id)?;
    let branch_id = q.primary_branch_id.unwrap_or(session.primary_branch_id);
    let limit = q.fetch_limit.unwrap_or(state.config.turn.default_fetch_limit).max(1) as usize;
    let page = state.messages.get_history(branch_id, q.before_message_id, limit)?;
    let branch = state.sessions.get_branch(branch_id)?;
    let pending_confirmation = branch
        .pending_confirmation
        .as_deref()
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok());
    Ok(Json(serde_json::json!({
        "sessionId": session.id,
        "history": page.messages,
        "hasMore": page.has_more,
        "systemPrompt": session.system_prompt,
        "workspaceId": session.workspace_id,
        "primaryBranchId": session.primary_branch_id,
        "pendingConfirmation": pending_confirmation,
    })))
}

#[derive(Deserialize)]
pub struct SetPrimaryBranchRequest {
    pub branch_id: i64,
}

/// PUT /api/chat/{sessionId}/branch
pub async fn set_primary_branch(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<SetPrimaryBranchRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state.sessions.set_primary_branch(&session_id, req.branch_id)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

/// POST /api/chat/{sessionId}/name
pub async fn rename(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state.sessions.rename_session(&session_id, &req.name)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Deserialize)]
pub struct ArchiveRequest {
    #[serde(default = "default_true")]
    pub archived: bool,
}

fn default_true() -> bool {
    true
}

/// POST /api/chat/{sessionId}/archive
pub async fn archive(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<ArchiveRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state.sessions.archive_session(&session_id, req.archived)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Deserialize)]
pub struct MoveWorkspaceRequest {
    pub workspace_id: String,
}

/// POST /api/chat/{sessionId}/workspace
pub async fn move_workspace(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<MoveWorkspaceRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state.sessions.move_workspace(&session_id, &req.workspace_id)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

/// POST /api/chat/{sessionId}/extract — plain-text transcript of the
/// session's primary branch, for copy-out/export use. No memory/fact-store
/// module exists in this tree to extract structured facts into.
pub async fn extract(State(state): State<Arc<AppState>>, Path(session_id): Path<String>) -> ApiResult<Json<serde_json::Value>> {
    let session = state.sessions.get_session(&session_id)?;
    let page = state.messages.get_history(session.primary_branch_id, None, 10_000)?;
    let mut lines: Vec<String> = page.messages.into_iter().rev().map(|m| format!("{}: {}", m.message_type.as_str(), m.text)).collect();
    lines.retain(|l| !l.trim().is_empty());
    Ok(Json(serde_json::json!({"transcript": lines.join("\n\n")})))
}

#[derive(Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub workspace_id: String,
    pub primary_branch_id: i64,
    pub last_updated_at: String,
    pub archived: bool,
}

impl From<conclave_sessions::Session> for SessionSummary {
    fn from(s: conclave_sessions::Session) -> Self {
        Self { id: s.id, name: s.name, workspace_id: s.workspace_id, primary_branch_id: s.primary_branch_id, last_updated_at: s.last_updated_at, archived: s.archived }
    }
}

/// GET /api/chat/sessions — every session, including archived.
pub async fn list_chat_sessions(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<SessionSummary>>> {
    let sessions = state.sessions.list_sessions(None, true)?;
    Ok(Json(sessions.into_iter().map(SessionSummary::from).collect()))
}

#[derive(Deserialize)]
pub struct ListSessionsQuery {
    pub workspace_id: Option<String>,
}

/// GET /api/sessions?workspaceId= — active sessions for one workspace.
pub async fn list_sessions(State(state): State<Arc<AppState>>, Query(q): Query<ListSessionsQuery>) -> ApiResult<Json<Vec<SessionSummary>>> {
    let sessions = state.sessions.list_sessions(q.workspace_id.as_deref(), false)?;
    Ok(Json(sessions.into_iter().map(SessionSummary::from).collect()))
}

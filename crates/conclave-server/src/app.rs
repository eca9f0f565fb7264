use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::Router;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use conclave_blob::BlobStore;
use conclave_core::ConclaveConfig;
use conclave_llm::LlmProvider;
use conclave_sessions::SessionManager;
use conclave_sse::SseHub;
use conclave_store::MessageStore;
use conclave_turn::{SandboxRegistry, TurnEngine};

/// Central shared state, passed as `Arc<AppState>` to every Axum handler.
pub struct AppState {
    pub config: ConclaveConfig,
    pub sessions: Arc<SessionManager>,
    pub messages: Arc<MessageStore>,
    pub blobs: Arc<BlobStore>,
    pub hub: Arc<SseHub>,
    pub engine: Arc<TurnEngine>,
    pub providers: HashMap<&'static str, Arc<dyn LlmProvider>>,
    /// Streaming operations in flight, keyed by branch id — a disconnect
    /// detector (not yet wired to axum's body-drop signal) would cancel
    /// the matching token here when a client goes away mid-generation.
    pub active_operations: DashMap<i64, CancellationToken>,
}

/// Reject any non-GET/HEAD request missing `X-CSRF-Token` (§6.2).
async fn csrf_guard(req: Request, next: Next) -> Result<Response, StatusCode> {
    let needs_token = !matches!(req.method(), &Method::GET | &Method::HEAD | &Method::OPTIONS);
    if needs_token && !req.headers().contains_key("x-csrf-token") {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(next.run(req).await)
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/api/chat", post(crate::http::chat::start_session))
        .route("/api/chat/message", post(crate::http::chat::send_message))
        .route(
            "/api/chat/{session_id}/branch/{branch_id}/confirm",
            post(crate::http::chat::confirm),
        )
        .route(
            "/api/chat/{session_id}/branch",
            post(crate::http::chat::new_branch).put(crate::http::chat::set_primary_branch),
        )
        .route(
            "/api/chat/{session_id}/branch/{branch_id}/retry-error",
            post(crate::http::chat::retry_error),
        )
        .route("/api/chat/{session_id}", get(crate::http::chat::get_history))
        .route("/api/chat/{session_id}/name", post(crate::http::chat::rename))
        .route("/api/chat/{session_id}/archive", post(crate::http::chat::archive))
        .route("/api/chat/{session_id}/workspace", post(crate::http::chat::move_workspace))
        .route("/api/chat/{session_id}/extract", post(crate::http::chat::extract))
        .route("/api/chat/sessions", get(crate::http::chat::list_chat_sessions))
        .route("/api/sessions", get(crate::http::chat::list_sessions))
        .route("/api/search", post(crate::http::search::search))
        .route("/api/blob/{hash}", get(crate::http::blob::get_blob))
        .route("/api/mcp/configs", get(crate::http::mcp::list).post(crate::http::mcp::upsert))
        .route("/api/mcp/configs/{name}", delete(crate::http::mcp::remove))
        .route(
            "/api/systemPrompts",
            get(crate::http::prompts::list_prompts).post(crate::http::prompts::upsert_prompt),
        )
        .route("/api/systemPrompts/{name}", delete(crate::http::prompts::delete_prompt))
        .route("/api/models", get(crate::http::prompts::list_models))
        .route("/api/accounts", get(crate::http::prompts::list_accounts))
        .route("/api/accounts/{id}/details", get(crate::http::prompts::account_details))
        .route("/api/workspaces", get(crate::http::prompts::list_workspaces))
        .layer(middleware::from_fn(csrf_guard))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

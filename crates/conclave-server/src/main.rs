mod app;
mod error;
mod http;
mod sse;

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use conclave_blob::BlobStore;
use conclave_core::ConclaveConfig;
use conclave_llm::{Account, AccountKind, AccountPool, GeminiOAuthProvider, LlmProvider, OpenAiProvider};
use conclave_sessions::SessionManager;
use conclave_sse::SseHub;
use conclave_store::MessageStore;
use conclave_turn::{provider_family, LlmImageGenerator, LlmSubagentRunner, OAuthTokenStore, SandboxRegistry, TurnEngine};

use crate::app::AppState;

/// On-disk OAuth credentials for a single Gemini account, written by the
/// account's initial OAuth login and refreshed in place by this server.
#[derive(serde::Deserialize)]
struct GeminiCredentialsFile {
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "conclave_server=info,tower_http=info".into()))
        .init();

    let config_path = std::env::var("CONCLAVE_CONFIG").ok();
    let config = ConclaveConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({e}), using defaults");
        ConclaveConfig::default()
    });

    std::fs::create_dir_all(&config.server.data_dir)?;
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Sessions and message history live in the same on-disk file; each
    // manager owns its own connection to it, as SQLite allows.
    let sessions_conn = rusqlite::Connection::open(&config.database.path)?;
    conclave_sessions::db::init_db(&sessions_conn)?;
    let sessions = Arc::new(SessionManager::new(sessions_conn));

    let store_conn = rusqlite::Connection::open(&config.database.path)?;
    conclave_store::db::init_db(&store_conn)?;
    let messages = Arc::new(MessageStore::new(store_conn));

    let blobs = Arc::new(BlobStore::new(&config.server.data_dir)?);

    let sandboxes_dir = std::path::PathBuf::from(&config.server.data_dir).join("sandboxes");
    std::fs::create_dir_all(&sandboxes_dir)?;
    let sandboxes = Arc::new(SandboxRegistry::new(sandboxes_dir, std::path::PathBuf::from(&config.database.path)));

    let hub = Arc::new(SseHub::new());

    let mut providers: HashMap<&'static str, Arc<dyn LlmProvider>> = HashMap::new();

    if let Some(gemini_config) = &config.providers.gemini {
        let mut refresh_tokens = HashMap::new();
        let mut client_id = String::new();
        let mut client_secret = String::new();
        let mut accounts = Vec::new();
        for account_config in &gemini_config.accounts {
            let raw = std::fs::read_to_string(&account_config.credentials_path)?;
            let creds: GeminiCredentialsFile = serde_json::from_str(&raw)?;
            client_id = creds.client_id;
            client_secret = creds.client_secret;
            refresh_tokens.insert(account_config.id.clone(), creds.refresh_token);
            accounts.push(Account::new(account_config.id.clone(), AccountKind::GeminiOAuth));
        }
        let pool = Arc::new(AccountPool::new(accounts));
        let tokens = Arc::new(OAuthTokenStore::new(client_id, client_secret, refresh_tokens));
        providers.insert("gemini", Arc::new(GeminiOAuthProvider::new(pool, tokens)));
    }

    if let Some(entry) = config.providers.openai_compat.first() {
        providers.insert("openai", Arc::new(OpenAiProvider::new(entry.api_key.clone(), Some(entry.base_url.clone()))));
    }

    if providers.is_empty() {
        anyhow::bail!("no LLM providers configured: set providers.gemini or providers.openai_compat in conclave.toml");
    }

    let default_provider = providers
        .get(provider_family(&config.turn.default_model))
        .cloned()
        .unwrap_or_else(|| providers.values().next().cloned().unwrap());
    let subagent_runner = Arc::new(LlmSubagentRunner::new(default_provider.clone(), config.turn.default_model.clone()));
    let image_generator = Arc::new(LlmImageGenerator::new(default_provider, config.turn.default_model.clone()));

    let engine = Arc::new(TurnEngine::new(
        sessions.clone(),
        messages.clone(),
        sandboxes,
        hub.clone(),
        providers.clone(),
        subagent_runner,
        image_generator,
        blobs.clone(),
        config.turn.context_budget_chars,
        config.turn.summarizer_model.clone(),
        config.turn.title_model.clone(),
    ));

    let bind = format!("{}:{}", config.server.bind, config.server.port);
    let state = Arc::new(AppState {
        config,
        sessions,
        messages,
        blobs,
        hub,
        engine,
        providers,
        active_operations: DashMap::new(),
    });

    let router = app::build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(%bind, "conclave-server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8789;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const SSE_KEEPALIVE_SECS: u64 = 15;
pub const DEFAULT_FETCH_LIMIT: i64 = 50;
pub const MAX_TOOL_LOOP_ITERATIONS: usize = 25;
/// Character budget for curated history before the turn engine inserts a
/// `compression` message (§4.7.4).
pub const DEFAULT_CONTEXT_BUDGET_CHARS: usize = 24_000;

/// Top-level config (`conclave.toml` + `CONCLAVE_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConclaveConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub turn: TurnConfig,
}

impl Default for ConclaveConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            providers: ProvidersConfig::default(),
            turn: TurnConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Data directory for blobs and sandbox roots (sibling to the database).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub gemini: Option<GeminiConfig>,
    /// Additional OpenAI-compatible providers, tried in configured order.
    #[serde(default)]
    pub openai_compat: Vec<OpenAiCompatEntry>,
}

/// Gemini OAuth account pool. Each account is independently rate-limited;
/// the LLM adapter picks the least-recently-used one with remaining quota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub accounts: Vec<GeminiAccountConfig>,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiAccountConfig {
    pub id: String,
    /// Path to the OAuth credentials file for this account (refreshed at runtime).
    pub credentials_path: String,
}

/// A single OpenAI-compatible provider entry, selected by enabled+configured
/// order (unbounded quota per §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiCompatEntry {
    pub id: String,
    pub api_key: String,
    pub base_url: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_context_budget")]
    pub context_budget_chars: usize,
    #[serde(default = "default_fetch_limit")]
    pub default_fetch_limit: i64,
    /// Cheap model used for context-compaction summaries (§4.7.4).
    #[serde(default = "default_summarizer_model")]
    pub summarizer_model: String,
    /// Cheap model used for session-name inference (§4.7.1).
    #[serde(default = "default_title_model")]
    pub title_model: String,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            context_budget_chars: default_context_budget(),
            default_fetch_limit: default_fetch_limit(),
            summarizer_model: default_summarizer_model(),
            title_model: default_title_model(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_model() -> String {
    "gemini-2.5-pro".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_chat_path() -> String {
    "/v1/chat/completions".to_string()
}
fn default_context_budget() -> usize {
    DEFAULT_CONTEXT_BUDGET_CHARS
}
fn default_fetch_limit() -> i64 {
    DEFAULT_FETCH_LIMIT
}
fn default_summarizer_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_title_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_data_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.conclave")
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.conclave/conclave.db")
}

impl ConclaveConfig {
    /// Load config from a TOML file with `CONCLAVE_*` env var overrides,
    /// split on `_` (e.g. `CONCLAVE_SERVER_PORT=9000`).
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: ConclaveConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CONCLAVE_").split("_"))
            .extract()
            .map_err(|e| crate::error::ConclaveError::BadRequest(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.conclave/conclave.toml")
}

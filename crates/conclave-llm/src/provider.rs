use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::part::{GenerateRequest, Part};

/// Classification of a provider's authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Plain API key (e.g. `sk-...`).
    ApiKey,
    /// OAuth access token with refresh capability.
    OAuth,
    /// No authentication needed (e.g. a local model server).
    None,
}

/// Snapshot of a provider's current authentication state.
#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    pub token_type: TokenType,
    /// Unix timestamp (seconds) when the token expires. `None` if unknown.
    pub expires_at: Option<i64>,
    /// Whether the provider can automatically refresh its credentials.
    pub refreshable: bool,
}

/// Tool definition sent to the LLM API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

pub type PartStream = Pin<Box<dyn Stream<Item = Part> + Send>>;

/// Common interface for all LLM providers (Gemini OAuth, OpenAI-compatible, ...).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging, error messages, and health tracking.
    fn name(&self) -> &str;

    /// Stream a generation as a sequence of `Part`s. Implementations emit a
    /// terminal `Part::Error` (rather than returning `Err`) on mid-stream
    /// failure, since the caller may already have persisted earlier parts.
    async fn generate(&self, req: &GenerateRequest) -> Result<PartStream, ProviderError>;

    /// Return current authentication state. Providers without tokens return `None`.
    fn token_info(&self) -> Option<TokenInfo> {
        None
    }

    /// Attempt to refresh authentication credentials.
    /// Providers that don't support refresh return `Ok(())` (no-op).
    async fn refresh_auth(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether this failure is safe to retry with an idempotent reconnect.
    /// Semantic errors (bad request, auth, rate limit) are not.
    pub fn is_idempotent_retryable(&self) -> bool {
        matches!(self, ProviderError::Http(_) | ProviderError::Unavailable(_))
    }
}

impl From<ProviderError> for conclave_core::ConclaveError {
    fn from(err: ProviderError) -> Self {
        match &err {
            ProviderError::RateLimited { retry_after_ms } => {
                conclave_core::ConclaveError::RateLimited { retry_after_ms: *retry_after_ms }
            }
            ProviderError::Api { status: 401, .. } => conclave_core::ConclaveError::Unauthorized(err.to_string()),
            ProviderError::Api { status: 400, .. } => conclave_core::ConclaveError::BadRequest(err.to_string()),
            ProviderError::Cancelled => conclave_core::ConclaveError::Internal("generation cancelled".into()),
            _ => conclave_core::ConclaveError::TransientNet(err.to_string()),
        }
    }
}

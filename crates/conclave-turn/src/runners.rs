//! Concrete implementations of the trait seams `conclave-tools` and
//! `conclave-llm` leave open, wired up here where both crates are in scope.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::RwLock;

use conclave_core::{ConclaveError, Result};
use conclave_llm::gemini_oauth::GeminiTokenStore;
use conclave_llm::{GenerateRequest, LlmProvider, Part, ProviderError};
use conclave_tools::{ImageGenerator, SubagentRunner};

/// Runs a subagent task as a one-shot, tool-free call to an LLM provider.
pub struct LlmSubagentRunner {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmSubagentRunner {
    pub fn new(provider: Arc<dyn LlmProvider>, model: String) -> Self {
        Self { provider, model }
    }
}

#[async_trait]
impl SubagentRunner for LlmSubagentRunner {
    async fn run(&self, task: &str) -> Result<String> {
        let req = GenerateRequest {
            model: self.model.clone(),
            system_prompt: "You are a focused subagent. Complete the task and report only the \
                result, with no preamble."
                .to_string(),
            messages: vec![serde_json::json!({"role": "user", "content": task})],
            tools: Vec::new(),
            max_tokens: 4096,
            thinking: None,
        };
        let mut stream = self.provider.generate(&req).await.map_err(ConclaveError::from)?;
        let mut answer = String::new();
        while let Some(part) = stream.next().await {
            match part {
                Part::Text { text } => answer.push_str(&text),
                Part::Error { message } => return Err(ConclaveError::ToolError(message)),
                _ => {}
            }
        }
        Ok(answer)
    }
}

/// Generates an image by asking an LLM provider for one inline attachment.
///
/// No image-capable provider exists in the corpus to ground a dedicated
/// wire format on, so this reuses the generic `LlmProvider::generate` path
/// and expects the provider to come back with a `Part::InlineData` part
/// carrying exactly one attachment, whose `hash` field is a `data:` URI
/// pending blob storage (the caller stores the decoded bytes itself).
pub struct LlmImageGenerator {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmImageGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, model: String) -> Self {
        Self { provider, model }
    }
}

#[async_trait]
impl ImageGenerator for LlmImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<(Vec<u8>, String)> {
        let req = GenerateRequest {
            model: self.model.clone(),
            system_prompt: String::new(),
            messages: vec![serde_json::json!({"role": "user", "content": prompt})],
            tools: Vec::new(),
            max_tokens: 4096,
            thinking: None,
        };
        let mut stream = self.provider.generate(&req).await.map_err(ConclaveError::from)?;
        while let Some(part) = stream.next().await {
            match part {
                Part::InlineData { attachments } => {
                    let Some(att) = attachments.into_iter().next() else { continue };
                    let (mime, bytes) = decode_data_uri(&att.hash)?;
                    return Ok((bytes, mime));
                }
                Part::Error { message } => return Err(ConclaveError::ToolError(message)),
                _ => {}
            }
        }
        Err(ConclaveError::ToolError("image provider returned no inline data".to_string()))
    }
}

fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| ConclaveError::ToolError("expected a data: URI from the image provider".to_string()))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| ConclaveError::ToolError("malformed data URI".to_string()))?;
    let mime = header.trim_end_matches(";base64").to_string();
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| ConclaveError::ToolError(format!("invalid base64 image data: {e}")))?;
    Ok((mime, bytes))
}

/// In-memory OAuth token cache for pooled Gemini accounts, refreshed against
/// Google's token endpoint. Accounts are configured with a long-lived
/// refresh token; access tokens are cached until shortly before expiry.
pub struct OAuthTokenStore {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    refresh_tokens: HashMap<String, String>,
    cache: RwLock<HashMap<String, CachedToken>>,
}

struct CachedToken {
    access_token: String,
    expires_at: i64,
}

impl OAuthTokenStore {
    pub fn new(client_id: String, client_secret: String, refresh_tokens: HashMap<String, String>) -> Self {
        Self { client: reqwest::Client::new(), client_id, client_secret, refresh_tokens, cache: RwLock::new(HashMap::new()) }
    }
}

#[async_trait]
impl GeminiTokenStore for OAuthTokenStore {
    async fn access_token(&self, account_id: &str) -> std::result::Result<String, ProviderError> {
        if let Some(cached) = self.cache.read().await.get(account_id) {
            let now = chrono::Utc::now().timestamp();
            if cached.expires_at - now > 30 {
                return Ok(cached.access_token.clone());
            }
        }
        self.refresh(account_id).await?;
        self.cache
            .read()
            .await
            .get(account_id)
            .map(|c| c.access_token.clone())
            .ok_or_else(|| ProviderError::Unavailable(format!("no token cached for account {account_id}")))
    }

    async fn refresh(&self, account_id: &str) -> std::result::Result<(), ProviderError> {
        let refresh_token = self
            .refresh_tokens
            .get(account_id)
            .ok_or_else(|| ProviderError::Unavailable(format!("no refresh token configured for account {account_id}")))?;

        let resp: TokenResponse = self
            .client
            .post("https://oauth2.googleapis.com/token")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?
            .error_for_status()
            .map_err(ProviderError::Http)?
            .json()
            .await?;

        let expires_at = chrono::Utc::now().timestamp() + resp.expires_in;
        self.cache
            .write()
            .await
            .insert(account_id.to_string(), CachedToken { access_token: resp.access_token, expires_at });
        Ok(())
    }
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

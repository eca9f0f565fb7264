//! Gemini provider authenticated via a pooled OAuth account.
//!
//! Credential storage and the OAuth refresh dance live behind
//! `GeminiTokenStore`, injected at construction — this module only knows how
//! to pick an account (`AccountPool`) and speak Gemini's `streamGenerateContent`
//! wire format once it has a bearer token.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::accounts::AccountPool;
use crate::part::{GenerateRequest, Part};
use crate::provider::{LlmProvider, PartStream, ProviderError, TokenInfo, TokenType};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[async_trait]
pub trait GeminiTokenStore: Send + Sync {
    async fn access_token(&self, account_id: &str) -> Result<String, ProviderError>;
    async fn refresh(&self, account_id: &str) -> Result<(), ProviderError>;
}

pub struct GeminiOAuthProvider {
    client: reqwest::Client,
    base_url: String,
    accounts: Arc<AccountPool>,
    tokens: Arc<dyn GeminiTokenStore>,
}

impl GeminiOAuthProvider {
    pub fn new(accounts: Arc<AccountPool>, tokens: Arc<dyn GeminiTokenStore>) -> Self {
        Self { client: reqwest::Client::new(), base_url: DEFAULT_BASE_URL.to_string(), accounts, tokens }
    }
}

#[async_trait]
impl LlmProvider for GeminiOAuthProvider {
    fn name(&self) -> &str {
        "gemini-oauth"
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<PartStream, ProviderError> {
        let account_id = self.accounts.resolve(&req.model, "chat").map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        let token = self.tokens.access_token(&account_id).await?;

        let body = build_request_body(req);
        let url = format!("{}/models/{}:streamGenerateContent?alt=sse", self.base_url, req.model);

        debug!(model = %req.model, account = %account_id, "sending streaming request to Gemini");

        let resp = self.client.post(&url).bearer_auth(&token).header("content-type", "application/json").json(&body).send().await?;

        let status = resp.status().as_u16();
        if status == 429 {
            self.accounts.mark_quota_exhausted(&account_id, 60_000);
            return Err(ProviderError::RateLimited { retry_after_ms: 60_000 });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Gemini API error");
            return Err(ProviderError::Api { status, message: text });
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(process_gemini_stream(resp, tx));
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn token_info(&self) -> Option<TokenInfo> {
        Some(TokenInfo { token_type: TokenType::OAuth, expires_at: None, refreshable: true })
    }

    async fn refresh_auth(&self) -> Result<(), ProviderError> {
        // Refreshed lazily per-account at call time via `tokens.access_token`;
        // nothing to eagerly refresh at the provider level.
        Ok(())
    }
}

fn build_request_body(req: &GenerateRequest) -> serde_json::Value {
    let contents: Vec<serde_json::Value> = req.messages.iter().cloned().collect();

    let mut body = serde_json::json!({
        "contents": contents,
        "systemInstruction": {"parts": [{"text": req.system_prompt}]},
        "generationConfig": {"maxOutputTokens": req.max_tokens},
    });

    if !req.tools.is_empty() {
        let declarations: Vec<serde_json::Value> = req
            .tools
            .iter()
            .map(|t| serde_json::json!({"name": t.name, "description": t.description, "parameters": t.input_schema}))
            .collect();
        body["tools"] = serde_json::json!([{"functionDeclarations": declarations}]);
    }

    if let Some(level) = req.thinking {
        let budget = level.budget_tokens();
        if budget > 0 {
            body["generationConfig"]["thinkingConfig"] = serde_json::json!({"thinkingBudget": budget});
        }
    }

    body
}

async fn process_gemini_stream(resp: reqwest::Response, tx: mpsc::Sender<Part>) {
    use futures_util::StreamExt;

    let mut line_buf = String::new();
    let mut byte_stream = resp.bytes_stream();

    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(Part::Error { message: e.to_string() }).await;
                return;
            }
        };
        let text = match std::str::from_utf8(&chunk) {
            Ok(t) => t,
            Err(_) => continue,
        };
        line_buf.push_str(text);

        let lines: Vec<&str> = line_buf.split('\n').collect();
        let (complete, remainder) = lines.split_at(lines.len() - 1);
        let remainder = remainder.first().unwrap_or(&"").to_string();

        for line in complete {
            let line = line.trim();
            let Some(data) = line.strip_prefix("data: ") else { continue };
            let Ok(parsed) = serde_json::from_str::<GeminiChunk>(data) else { continue };

            if let Some(candidate) = parsed.candidates.into_iter().next() {
                for part in candidate.content.parts {
                    if let Some(text) = part.text {
                        if part.thought.unwrap_or(false) {
                            if tx.send(Part::Thought { text }).await.is_err() {
                                return;
                            }
                        } else if tx.send(Part::Text { text }).await.is_err() {
                            return;
                        }
                    }
                    if let Some(call) = part.function_call {
                        if tx.send(Part::FunctionCall { name: call.name, args: call.args }).await.is_err() {
                            return;
                        }
                    }
                }
                if let Some(reason) = candidate.finish_reason {
                    if tx.send(Part::FinishReason { reason }).await.is_err() {
                        return;
                    }
                }
            }

            if let Some(usage) = parsed.usage_metadata {
                if tx.send(Part::TokenCount { cumulative: usage.total_token_count as i64 }).await.is_err() {
                    return;
                }
            }
        }

        line_buf = remainder;
    }
}

#[derive(Deserialize)]
struct GeminiChunk {
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
    thought: Option<bool>,
    #[serde(rename = "functionCall")]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Deserialize)]
struct GeminiFunctionCall {
    name: String,
    args: serde_json::Value,
}

#[derive(Deserialize)]
struct GeminiUsage {
    #[serde(rename = "totalTokenCount")]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ToolDefinition;

    #[test]
    fn build_request_body_includes_system_instruction_and_tools() {
        let req = GenerateRequest {
            model: "gemini-2.5-pro".into(),
            system_prompt: "be helpful".into(),
            messages: vec![serde_json::json!({"role": "user", "parts": [{"text": "hi"}]})],
            tools: vec![ToolDefinition { name: "read_file".into(), description: "reads a file".into(), input_schema: serde_json::json!({"type": "object"}) }],
            max_tokens: 1024,
            thinking: None,
        };
        let body = build_request_body(&req);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be helpful");
        assert_eq!(body["tools"][0]["functionDeclarations"][0]["name"], "read_file");
    }

    #[test]
    fn thinking_budget_is_omitted_when_off() {
        let req = GenerateRequest {
            model: "gemini-2.5-pro".into(),
            system_prompt: String::new(),
            messages: vec![],
            tools: vec![],
            max_tokens: 1024,
            thinking: Some(crate::thinking::ThinkingLevel::Off),
        };
        let body = build_request_body(&req);
        assert!(body["generationConfig"].get("thinkingConfig").is_none());
    }
}

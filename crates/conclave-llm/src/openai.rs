//! OpenAI-compatible chat-completions provider (OpenAI itself, and any
//! self-hosted server implementing the same wire format).

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::part::{GenerateRequest, Part};
use crate::provider::{LlmProvider, PartStream, ProviderError};

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    provider_name: String,
    /// Path appended to base_url for chat completions.
    /// Default: "/v1/chat/completions"
    chat_path: String,
}

impl OpenAiProvider {
    /// Create a standard OpenAI provider.
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self::with_path(
            "openai",
            api_key,
            base_url.unwrap_or_else(|| "https://api.openai.com".to_string()),
            "/v1/chat/completions".to_string(),
        )
    }

    /// Create a named OpenAI-compatible provider with a custom endpoint path.
    /// `base_url` should NOT include a trailing slash.
    /// `chat_path` should start with "/" (e.g. "/v1/chat/completions").
    pub fn with_path(name: impl Into<String>, api_key: String, base_url: String, chat_path: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider_name: name.into(),
            api_key,
            base_url,
            chat_path,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<PartStream, ProviderError> {
        let body = build_request_body(req);
        let url = format!("{}{}", self.base_url, self.chat_path);

        debug!(model = %req.model, "sending streaming request to OpenAI-compatible endpoint");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|s| s * 1000)
                .unwrap_or(5000);
            return Err(ProviderError::RateLimited { retry_after_ms: retry });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "OpenAI-compatible API error");
            return Err(ProviderError::Api { status, message: text });
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(process_openai_stream(resp, tx));
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

pub(crate) fn build_request_body(req: &GenerateRequest) -> serde_json::Value {
    let mut messages = vec![serde_json::json!({"role": "system", "content": req.system_prompt})];
    messages.extend(req.messages.iter().cloned());

    let mut body = serde_json::json!({
        "model": req.model,
        "messages": messages,
        "max_tokens": req.max_tokens,
        "stream": true,
        "stream_options": {"include_usage": true},
    });

    if !req.tools.is_empty() {
        let tools: Vec<serde_json::Value> = req
            .tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
                })
            })
            .collect();
        body["tools"] = serde_json::json!(tools);
    }

    body
}

/// Parse OpenAI streaming SSE response and emit `Part`s.
/// OpenAI SSE format: `data: <json>\n\n`, terminated by `data: [DONE]`.
pub(crate) async fn process_openai_stream(resp: reqwest::Response, tx: mpsc::Sender<Part>) {
    use futures_util::StreamExt;

    let mut tokens_total: i64 = 0;
    let mut stop_reason = String::new();
    let mut line_buf = String::new();
    let mut pending_calls: Vec<PendingToolCall> = Vec::new();

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
            if data.trim() == "[DONE]" {
                break;
            }

            let Ok(chunk_resp) = serde_json::from_str::<StreamChunk>(data) else { continue };
            if let Some(usage) = &chunk_resp.usage {
                tokens_total = (usage.prompt_tokens + usage.completion_tokens) as i64;
            }

            for choice in &chunk_resp.choices {
                if let Some(reason) = &choice.finish_reason {
                    if !reason.is_empty() {
                        stop_reason = reason.clone();
                    }
                }
                if let Some(content) = &choice.delta.content {
                    if !content.is_empty() && tx.send(Part::Text { text: content.clone() }).await.is_err() {
                        return;
                    }
                }
                if let Some(deltas) = &choice.delta.tool_calls {
                    for d in deltas {
                        merge_tool_call_delta(&mut pending_calls, d);
                    }
                }
            }
        }

        line_buf = remainder;
    }

    for call in pending_calls {
        let args = serde_json::from_str(&call.arguments).unwrap_or(serde_json::Value::Null);
        if tx.send(Part::FunctionCall { name: call.name, args }).await.is_err() {
            return;
        }
    }

    if tokens_total > 0 {
        let _ = tx.send(Part::TokenCount { cumulative: tokens_total }).await;
    }
    let reason = if stop_reason.is_empty() { "stop".to_string() } else { stop_reason };
    let _ = tx.send(Part::FinishReason { reason }).await;
}

struct PendingToolCall {
    index: u32,
    name: String,
    arguments: String,
}

fn merge_tool_call_delta(pending: &mut Vec<PendingToolCall>, delta: &ToolCallDelta) {
    let idx = delta.index.unwrap_or(0);
    if let Some(existing) = pending.iter_mut().find(|c| c.index == idx) {
        if let Some(args) = &delta.function.arguments {
            existing.arguments.push_str(args);
        }
        return;
    }
    pending.push(PendingToolCall {
        index: idx,
        name: delta.function.name.clone().unwrap_or_default(),
        arguments: delta.function.arguments.clone().unwrap_or_default(),
    });
}

// OpenAI streaming chunk types.

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
    usage: Option<StreamUsage>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Deserialize)]
struct ToolCallDelta {
    index: Option<u32>,
    function: ToolCallFunctionDelta,
}

#[derive(Deserialize)]
struct ToolCallFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct StreamUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ToolDefinition;

    #[test]
    fn build_request_body_includes_system_and_tools() {
        let req = GenerateRequest {
            model: "gpt-4o".into(),
            system_prompt: "be helpful".into(),
            messages: vec![serde_json::json!({"role": "user", "content": "hi"})],
            tools: vec![ToolDefinition {
                name: "read_file".into(),
                description: "reads a file".into(),
                input_schema: serde_json::json!({"type": "object"}),
            }],
            max_tokens: 1024,
            thinking: None,
        };
        let body = build_request_body(&req);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["tools"][0]["function"]["name"], "read_file");
    }

    #[test]
    fn merge_tool_call_delta_accumulates_arguments_by_index() {
        let mut pending = Vec::new();
        merge_tool_call_delta(
            &mut pending,
            &ToolCallDelta { index: Some(0), function: ToolCallFunctionDelta { name: Some("read_file".into()), arguments: Some("{\"path\":".into()) } },
        );
        merge_tool_call_delta(
            &mut pending,
            &ToolCallDelta { index: Some(0), function: ToolCallFunctionDelta { name: None, arguments: Some("\"a.txt\"}".into()) } },
        );
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].arguments, "{\"path\":\"a.txt\"}");
        assert_eq!(pending[0].name, "read_file");
    }
}

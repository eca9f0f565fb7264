//! `web_fetch` — retrieve a URL and return its body as text.

use async_trait::async_trait;
use conclave_core::{ConclaveError, Result};

use crate::registry::{ensure_known_keys, Tool, ToolCallParams, ToolOutcome};

const MAX_BODY_CHARS: usize = 50_000;

pub struct WebFetchTool {
    client: reqwest::Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a URL over HTTP(S) and return its response body as text, truncated to a safe size."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Absolute http(s) URL to fetch."}
            },
            "required": ["url"]
        })
    }

    async fn call(&self, args: serde_json::Value, _params: &ToolCallParams) -> Result<ToolOutcome> {
        ensure_known_keys("web_fetch", &args, &["url"])?;
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConclaveError::BadRequest("web_fetch: missing 'url'".into()))?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConclaveError::BadRequest("web_fetch: url must be http(s)".into()));
        }

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ConclaveError::TransientNet(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| ConclaveError::TransientNet(e.to_string()))?;

        let truncated = body.len() > MAX_BODY_CHARS;
        let mut body = body;
        if truncated {
            body.truncate(MAX_BODY_CHARS);
        }

        Ok(ToolOutcome::value(serde_json::json!({
            "status": status,
            "body": body,
            "truncated": truncated,
        })))
    }
}

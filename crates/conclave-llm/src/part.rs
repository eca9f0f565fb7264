//! `Part`: the unit the LLM adapter streams, and the request it answers.

use conclave_store::FileAttachment;
use serde::{Deserialize, Serialize};

use crate::provider::ToolDefinition;
use crate::thinking::ThinkingLevel;

/// One unit of a model's streamed response. Each `Part` is persisted as (or
/// folds into) a message on the branch and mirrored onto the matching SSE
/// event by the Turn engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
    /// Visible model output.
    Text { text: String },
    /// Internal reasoning, never shown to end users directly.
    Thought { text: String },
    /// The model wants to call a tool.
    FunctionCall { name: String, args: serde_json::Value },
    /// The result of executing a function call, fed back into the next turn.
    FunctionResponse {
        name: String,
        response: serde_json::Value,
        #[serde(default)]
        attachments: Vec<FileAttachment>,
    },
    /// Raw binary content the model produced directly (e.g. generated media).
    InlineData { attachments: Vec<FileAttachment> },
    /// Why the model stopped generating.
    FinishReason { reason: String },
    /// Running token count for the generation so far.
    TokenCount { cumulative: i64 },
    /// Terminal stream failure.
    Error { message: String },
}

/// Request to the LLM adapter's `generate` operation.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system_prompt: String,
    pub messages: Vec<serde_json::Value>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
    pub thinking: Option<ThinkingLevel>,
}

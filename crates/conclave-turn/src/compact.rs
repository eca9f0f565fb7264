//! Context compaction (§4.7.4): once a branch's curated history exceeds a
//! character budget, fold everything but the freshest messages into a single
//! `compression` message. Adapted from fact-extraction-style compaction
//! (summarize-then-drop-the-originals-from-the-live-view) to a per-branch,
//! character-budget trigger instead of a per-channel turn-count trigger.

use futures_util::StreamExt;
use tracing::{info, warn};

use conclave_core::{ConclaveError, MessageType, Result};
use conclave_llm::{GenerateRequest, LlmProvider, Part};
use conclave_store::{Message, MessageStore};

const SUMMARIZER_SYSTEM_PROMPT: &str = "Summarize the conversation turns below concisely. \
Preserve facts the user stated, decisions made, and any open tasks. Write plain prose, no \
preamble, no code fences.";

/// Run before a turn's new user message is persisted. If `curated`'s total
/// character count exceeds `budget_chars`, every message in it is folded
/// into one new `compression` row (and dropped from future curated views via
/// `mark_unindexed`) so subsequent turns see the summary instead of the raw
/// originals. Requires at least 4 curated messages so a single exchange is
/// never compacted away.
pub async fn maybe_compact(
    messages: &MessageStore,
    summarizer: &dyn LlmProvider,
    summarizer_model: &str,
    branch_id: i64,
    curated: &[Message],
    budget_chars: usize,
) -> Result<bool> {
    let total_chars: usize = curated.iter().map(|m| m.text.len()).sum();
    if total_chars <= budget_chars || curated.len() < 4 {
        return Ok(false);
    }

    info!(branch_id, total_chars, budget_chars, "compacting curated history");

    let transcript: String = curated
        .iter()
        .map(|m| format!("{}: {}", m.message_type.as_str(), m.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    let req = GenerateRequest {
        model: summarizer_model.to_string(),
        system_prompt: SUMMARIZER_SYSTEM_PROMPT.to_string(),
        messages: vec![serde_json::json!({"role": "user", "content": transcript})],
        tools: Vec::new(),
        max_tokens: 512,
        thinking: None,
    };

    let mut stream = summarizer.generate(&req).await.map_err(ConclaveError::from)?;
    let mut summary = String::new();
    while let Some(part) = stream.next().await {
        match part {
            Part::Text { text } => summary.push_str(&text),
            Part::Error { message } => {
                warn!(branch_id, error = %message, "compaction summarizer call failed");
                return Ok(false);
            }
            _ => {}
        }
    }

    let summary = summary.trim();
    if summary.is_empty() {
        warn!(branch_id, "compaction summarizer returned empty text, leaving history uncompacted");
        return Ok(false);
    }

    messages.append_message(branch_id, MessageType::Compression, summary, &[], None, 0)?;
    let ids: Vec<i64> = curated.iter().map(|m| m.id).collect();
    messages.mark_unindexed(&ids)?;

    info!(branch_id, compacted = ids.len(), "compaction complete");
    Ok(true)
}

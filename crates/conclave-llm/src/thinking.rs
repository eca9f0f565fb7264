//! Extended-reasoning budget control (§4.2.4, §4.7.1).
//!
//! A turn can ask the model to spend part of its token budget on an internal
//! reasoning pass before it produces the reply the user sees. `ThinkingLevel`
//! is the knob a caller sets on a [`crate::part::GenerateRequest`]; each
//! level maps to a fixed token ceiling that gets forwarded to the provider.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    /// No reasoning pass; the provider call omits the thinking block entirely.
    #[default]
    Off,
    Minimal,
    Low,
    Medium,
    High,
    XHigh,
}

const LEVELS: [(ThinkingLevel, &str, u32); 6] = [
    (ThinkingLevel::Off, "off", 0),
    (ThinkingLevel::Minimal, "minimal", 1_024),
    (ThinkingLevel::Low, "low", 4_096),
    (ThinkingLevel::Medium, "medium", 8_192),
    (ThinkingLevel::High, "high", 16_384),
    (ThinkingLevel::XHigh, "xhigh", 32_768),
];

impl ThinkingLevel {
    /// Token ceiling for the reasoning pass. `0` means "send no thinking block."
    pub fn budget_tokens(&self) -> u32 {
        LEVELS.iter().find(|(level, _, _)| level == self).map(|(_, _, tokens)| *tokens).unwrap_or(0)
    }

    /// Case-insensitive parse of a config/query-string slug
    /// (`off`/`minimal`/`low`/`medium`/`high`/`xhigh`).
    pub fn parse(slug: &str) -> Option<Self> {
        let lowered = slug.to_lowercase();
        LEVELS.iter().find(|(_, name, _)| *name == lowered).map(|(level, _, _)| *level)
    }
}

impl fmt::Display for ThinkingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = LEVELS.iter().find(|(level, _, _)| level == self).map(|(_, name, _)| *name).unwrap_or("off");
        f.write_str(name)
    }
}

/// Drop `thinking`-typed content blocks from prior assistant turns.
///
/// Providers that support extended reasoning generally refuse a request that
/// replays a thinking block from an earlier turn verbatim, so history has to
/// be scrubbed before it's resent. Only `content` arrays on `assistant`
/// messages are touched; plain-string content and non-assistant roles pass
/// through untouched.
pub fn strip_thinking_blocks(messages: &mut [serde_json::Value]) {
    for message in messages.iter_mut() {
        if message.get("role").and_then(|r| r.as_str()) != Some("assistant") {
            continue;
        }
        let Some(content) = message.get_mut("content") else { continue };
        let Some(blocks) = content.as_array() else { continue };
        let kept: Vec<serde_json::Value> =
            blocks.iter().filter(|block| block.get("type").and_then(|t| t.as_str()) != Some("thinking")).cloned().collect();
        *content = serde_json::Value::Array(kept);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_tokens_scale_with_level() {
        assert_eq!(ThinkingLevel::Off.budget_tokens(), 0);
        assert_eq!(ThinkingLevel::Minimal.budget_tokens(), 1_024);
        assert_eq!(ThinkingLevel::Low.budget_tokens(), 4_096);
        assert_eq!(ThinkingLevel::Medium.budget_tokens(), 8_192);
        assert_eq!(ThinkingLevel::High.budget_tokens(), 16_384);
        assert_eq!(ThinkingLevel::XHigh.budget_tokens(), 32_768);
    }

    #[test]
    fn parse_accepts_every_slug_case_insensitively() {
        let cases = [
            ("off", ThinkingLevel::Off),
            ("Minimal", ThinkingLevel::Minimal),
            ("LOW", ThinkingLevel::Low),
            ("medium", ThinkingLevel::Medium),
            ("High", ThinkingLevel::High),
            ("XHIGH", ThinkingLevel::XHigh),
        ];
        for (slug, expected) in cases {
            assert_eq!(ThinkingLevel::parse(slug), Some(expected), "slug: {slug}");
        }
        assert_eq!(ThinkingLevel::parse("turbo"), None);
    }

    #[test]
    fn display_and_parse_round_trip() {
        for level in [ThinkingLevel::Off, ThinkingLevel::Minimal, ThinkingLevel::Low, ThinkingLevel::Medium, ThinkingLevel::High, ThinkingLevel::XHigh] {
            assert_eq!(ThinkingLevel::parse(&level.to_string()), Some(level));
        }
    }

    #[test]
    fn default_level_is_off() {
        assert_eq!(ThinkingLevel::default(), ThinkingLevel::Off);
    }

    #[test]
    fn strips_thinking_blocks_from_assistant_content() {
        let mut messages = vec![
            serde_json::json!({
                "role": "assistant",
                "content": [
                    {"type": "thinking", "thinking": "scratch work"},
                    {"type": "text", "text": "final answer"}
                ]
            }),
            serde_json::json!({"role": "user", "content": "question"}),
        ];
        strip_thinking_blocks(&mut messages);
        let content = messages[0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "text");
    }

    #[test]
    fn leaves_user_messages_alone() {
        let mut messages = vec![serde_json::json!({"role": "user", "content": [{"type": "text", "text": "hi"}]})];
        strip_thinking_blocks(&mut messages);
        assert_eq!(messages[0]["content"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn no_op_when_there_is_nothing_to_strip() {
        let mut messages = vec![serde_json::json!({"role": "assistant", "content": [{"type": "text", "text": "reply"}]})];
        strip_thinking_blocks(&mut messages);
        assert_eq!(messages[0]["content"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn string_content_is_left_as_is() {
        let mut messages = vec![serde_json::json!({"role": "assistant", "content": "plain text"})];
        strip_thinking_blocks(&mut messages);
        assert_eq!(messages[0]["content"], "plain text");
    }
}

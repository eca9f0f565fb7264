//! System prompt assembly: stored prompt text + environment snapshot + volatile
//! per-turn metadata, kept as separate cache tiers for providers that support
//! prompt caching (only the volatile tier changes turn to turn).

use serde::Serialize;

/// Three-tier system prompt. Tier 1 and 2 are stable across a session's
/// turns and can be cached by the provider; tier 3 changes every turn and is
/// placed last so it never invalidates an earlier cache breakpoint.
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    /// The session's stored system prompt text.
    pub static_tier: String,
    /// Rendered environment snapshot (granted roots).
    pub env_tier: String,
    /// Turn count and timestamp — changes every turn.
    pub volatile_tier: String,
}

impl SystemPrompt {
    pub fn to_plain_text(&self) -> String {
        let mut out = self.static_tier.clone();
        if !self.env_tier.is_empty() {
            out.push_str("\n\n");
            out.push_str(&self.env_tier);
        }
        if !self.volatile_tier.is_empty() {
            out.push_str("\n\n");
            out.push_str(&self.volatile_tier);
        }
        out
    }

    /// Content blocks with cache breakpoints after tiers 1 and 2, for
    /// providers (Anthropic-style APIs) that honor `cache_control` markers.
    pub fn to_cached_blocks(&self) -> Vec<serde_json::Value> {
        let mut blocks = Vec::with_capacity(3);
        blocks.push(serde_json::json!({
            "type": "text",
            "text": self.static_tier,
            "cache_control": {"type": "ephemeral"},
        }));
        if !self.env_tier.is_empty() {
            blocks.push(serde_json::json!({
                "type": "text",
                "text": self.env_tier,
                "cache_control": {"type": "ephemeral"},
            }));
        }
        if !self.volatile_tier.is_empty() {
            blocks.push(serde_json::json!({"type": "text", "text": self.volatile_tier}));
        }
        blocks
    }
}

/// Volatile per-turn metadata injected into tier 3.
#[derive(Debug, Clone, Serialize)]
pub struct TurnInfo {
    pub session_id: String,
    pub generation: i64,
    pub timestamp: String,
}

pub fn build_prompt(system_prompt: &str, env_roots: &[String], turn_info: &TurnInfo) -> SystemPrompt {
    let env_tier = if env_roots.is_empty() {
        String::new()
    } else {
        let mut s = String::from("## Environment\nGranted roots:\n");
        for root in env_roots {
            s.push_str("- ");
            s.push_str(root);
            s.push('\n');
        }
        s
    };

    let volatile_tier = format!(
        "[Session: {} | Generation: {} | Time: {}]",
        turn_info.session_id, turn_info.generation, turn_info.timestamp
    );

    SystemPrompt { static_tier: system_prompt.to_string(), env_tier, volatile_tier }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_joins_non_empty_tiers() {
        let prompt = build_prompt(
            "be helpful",
            &["/workspace".to_string()],
            &TurnInfo { session_id: "s1".into(), generation: 0, timestamp: "now".into() },
        );
        let text = prompt.to_plain_text();
        assert!(text.contains("be helpful"));
        assert!(text.contains("/workspace"));
        assert!(text.contains("Session: s1"));
    }

    #[test]
    fn empty_env_roots_omit_env_tier() {
        let prompt = build_prompt("be helpful", &[], &TurnInfo { session_id: "s1".into(), generation: 0, timestamp: "now".into() });
        assert!(prompt.env_tier.is_empty());
    }

    #[test]
    fn cached_blocks_mark_first_two_tiers_ephemeral() {
        let prompt = build_prompt(
            "be helpful",
            &["/workspace".to_string()],
            &TurnInfo { session_id: "s1".into(), generation: 0, timestamp: "now".into() },
        );
        let blocks = prompt.to_cached_blocks();
        assert_eq!(blocks[0]["cache_control"]["type"], "ephemeral");
        assert_eq!(blocks[1]["cache_control"]["type"], "ephemeral");
        assert!(blocks[2].get("cache_control").is_none());
    }
}

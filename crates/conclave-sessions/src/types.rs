use serde::{Deserialize, Serialize};

/// Identifies a conversation. See `conclave_core::session_id` for the
/// temporary/subsession parsing rules layered on top of `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub system_prompt: String,
    pub workspace_id: String,
    pub primary_branch_id: i64,
    pub last_updated_at: String,
    pub archived: bool,
}

/// A linear sequence of messages forming one plausible conversation path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: i64,
    pub session_id: String,
    pub parent_branch_id: Option<i64>,
    pub branch_from_message_id: Option<i64>,
    /// Serialized pending function-call awaiting confirmation, if any.
    pub pending_confirmation: Option<String>,
    pub created_at: String,
}

/// A grouping of sessions sharing a default system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub default_system_prompt: String,
}

/// A named system-prompt template (ambient addition, §3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub template: String,
    pub updated_at: String,
}

/// A configured MCP server connection, federated into the tool registry
/// when `enabled` (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub enabled: bool,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_serde_roundtrip() {
        let s = Session {
            id: "abc".into(),
            name: "New Chat".into(),
            system_prompt: String::new(),
            workspace_id: "default".into(),
            primary_branch_id: 1,
            last_updated_at: "2026-01-01T00:00:00Z".into(),
            archived: false,
        };
        let json = serde_json::to_string(&s).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, s.id);
    }
}

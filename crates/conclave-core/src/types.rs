use serde::{Deserialize, Serialize};

/// Role a message plays in the LLM-facing conversation view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    System,
}

/// The kind of a persisted message row.
///
/// `role()` and `curated()` are pinned by this table rather than inferred at
/// call sites, so every consumer (turn engine, message store, HTTP surface)
/// agrees on which messages count as conversation turns vs. side channel
/// bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    User,
    Model,
    Thought,
    FunctionCall,
    FunctionResponse,
    SystemPrompt,
    EnvChanged,
    Compression,
    ModelError,
    Error,
    Command,
}

impl MessageType {
    pub fn role(&self) -> Role {
        match self {
            MessageType::User | MessageType::Command => Role::User,
            MessageType::Model
            | MessageType::Thought
            | MessageType::FunctionCall
            | MessageType::FunctionResponse => Role::Model,
            MessageType::SystemPrompt
            | MessageType::EnvChanged
            | MessageType::Compression
            | MessageType::ModelError
            | MessageType::Error => Role::System,
        }
    }

    /// Whether this message type belongs in the curated prompt history built
    /// for each generation cycle. Thoughts are persisted but never replayed
    /// to the model; `env_changed`/`error` rows are side-channel bookkeeping.
    pub fn curated(&self) -> bool {
        matches!(
            self,
            MessageType::User
                | MessageType::Model
                | MessageType::FunctionCall
                | MessageType::FunctionResponse
                | MessageType::Compression
                | MessageType::Command
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::User => "user",
            MessageType::Model => "model",
            MessageType::Thought => "thought",
            MessageType::FunctionCall => "function_call",
            MessageType::FunctionResponse => "function_response",
            MessageType::SystemPrompt => "system_prompt",
            MessageType::EnvChanged => "env_changed",
            MessageType::Compression => "compression",
            MessageType::ModelError => "model_error",
            MessageType::Error => "error",
            MessageType::Command => "command",
        }
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "user" => MessageType::User,
            "model" => MessageType::Model,
            "thought" => MessageType::Thought,
            "function_call" => MessageType::FunctionCall,
            "function_response" => MessageType::FunctionResponse,
            "system_prompt" => MessageType::SystemPrompt,
            "env_changed" => MessageType::EnvChanged,
            "compression" => MessageType::Compression,
            "model_error" => MessageType::ModelError,
            "error" => MessageType::Error,
            "command" => MessageType::Command,
            other => return Err(format!("unknown message type: {other}")),
        })
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thought_is_not_curated() {
        assert!(!MessageType::Thought.curated());
        assert_eq!(MessageType::Thought.role(), Role::Model);
    }

    #[test]
    fn roundtrip_str() {
        for ty in [
            MessageType::User,
            MessageType::Model,
            MessageType::Thought,
            MessageType::FunctionCall,
            MessageType::FunctionResponse,
            MessageType::SystemPrompt,
            MessageType::EnvChanged,
            MessageType::Compression,
            MessageType::ModelError,
            MessageType::Error,
            MessageType::Command,
        ] {
            let s = ty.as_str();
            assert_eq!(s.parse::<MessageType>().unwrap(), ty);
        }
    }
}

//! LLM adapter (C5): provider abstraction, account selection, streaming `Part`s.

pub mod accounts;
pub mod gemini_oauth;
pub mod openai;
pub mod part;
pub mod provider;
pub mod thinking;

pub use accounts::{Account, AccountKind, AccountPool};
pub use gemini_oauth::{GeminiOAuthProvider, GeminiTokenStore};
pub use openai::OpenAiProvider;
pub use part::{GenerateRequest, Part};
pub use provider::{LlmProvider, PartStream, ProviderError, TokenInfo, TokenType, ToolDefinition};
pub use thinking::ThinkingLevel;

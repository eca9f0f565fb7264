//! Turn engine (C6): the per-branch generation cycle that brokers between
//! persisted conversation state, the tool registry, and an LLM provider.

pub mod compact;
pub mod diff;
pub mod engine;
pub mod prompt;
pub mod runners;
pub mod sandbox_registry;

pub use diff::diff;
pub use engine::{provider_family, Terminal, TurnEngine};
pub use runners::{LlmImageGenerator, LlmSubagentRunner, OAuthTokenStore};
pub use sandbox_registry::SandboxRegistry;

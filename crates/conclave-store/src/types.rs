use serde::{Deserialize, Serialize};

use conclave_core::MessageType;

/// A file reference attached to a message. Bytes live in the blob store
/// (C1), addressed by `hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub hash: String,
}

/// One atomic entry in a branch's message DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub branch_id: i64,
    pub parent_message_id: Option<i64>,
    pub chosen_next_id: Option<i64>,
    pub text: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub attachments: Vec<FileAttachment>,
    pub cumul_token_count: i64,
    pub model: Option<String>,
    pub created_at: String,
    pub generation: i64,
    pub indexed: bool,
}

/// One full-text search hit with a `<mark>`-wrapped excerpt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub message_id: i64,
    pub branch_id: i64,
    pub snippet: String,
    pub created_at: String,
}

/// A page of search results, keyset-paginated by `max_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub hits: Vec<SearchHit>,
    pub has_more: bool,
    pub next_max_id: Option<i64>,
}

/// A page of history, newest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub has_more: bool,
}

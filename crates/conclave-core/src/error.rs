use thiserror::Error;

/// Error taxonomy shared across every crate boundary (store, sandbox, tools,
/// llm, turn, server). Each variant carries a `code()` the HTTP surface maps
/// to a status per the error handling design.
#[derive(Debug, Error)]
pub enum ConclaveError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("transient network error: {0}")]
    TransientNet(String),

    #[error("tool denied: {0}")]
    ToolDenied(String),

    #[error("tool error: {0}")]
    ToolError(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("blob not found: {0}")]
    BlobNotFound(String),

    #[error("corrupt data: {0}")]
    Corrupt(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConclaveError {
    /// Short error code, mirrored onto terminal SSE `E` events and mapped to
    /// an HTTP status by the server surface.
    pub fn code(&self) -> &'static str {
        match self {
            ConclaveError::BadRequest(_) => "bad-request",
            ConclaveError::Unauthorized(_) => "unauthorized",
            ConclaveError::NotFound(_) => "not-found",
            ConclaveError::Conflict(_) => "conflict",
            ConclaveError::RateLimited { .. } => "rate-limited",
            ConclaveError::TransientNet(_) => "transient-net",
            ConclaveError::ToolDenied(_) => "tool-denied",
            ConclaveError::ToolError(_) => "tool-error",
            ConclaveError::Database(_) => "database-error",
            ConclaveError::BlobNotFound(_) => "blob-not-found",
            ConclaveError::Corrupt(_) => "corrupt",
            ConclaveError::Serialization(_) => "bad-request",
            ConclaveError::Io(_) => "internal",
            ConclaveError::Internal(_) => "internal",
        }
    }

    /// HTTP status this error maps to, per the error handling design table.
    pub fn http_status(&self) -> u16 {
        match self {
            ConclaveError::BadRequest(_) | ConclaveError::Serialization(_) => 400,
            ConclaveError::Unauthorized(_) => 401,
            ConclaveError::NotFound(_) | ConclaveError::BlobNotFound(_) => 404,
            ConclaveError::Conflict(_) => 409,
            ConclaveError::RateLimited { .. } => 429,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConclaveError>;

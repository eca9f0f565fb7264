//! Error types for the sandbox filesystem/exec surface (C3).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    /// A requested path escaped every granted root (traversal or symlink).
    #[error("path escapes sandbox: {0}")]
    PathEscape(String),

    /// PTY allocation or child-process spawn failed.
    #[error("spawn error: {0}")]
    Spawn(String),

    /// The requested PTY session ID does not exist in the manager.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Underlying I/O failure (read, write, flush).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation exceeded its time budget.
    #[error("operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Command was rejected by the safety checker.
    #[error("command blocked: {reason}")]
    CommandBlocked { reason: String },

    /// The requested background job ID does not exist.
    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl SandboxError {
    pub fn code(&self) -> &'static str {
        match self {
            SandboxError::PathEscape(_) => "bad-request",
            SandboxError::SessionNotFound(_) | SandboxError::JobNotFound(_) => "not-found",
            SandboxError::CommandBlocked { .. } => "tool-denied",
            SandboxError::Timeout { .. } => "transient-net",
            SandboxError::Database(_) => "database-error",
            SandboxError::Spawn(_) | SandboxError::Io(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, SandboxError>;

impl From<SandboxError> for conclave_core::ConclaveError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::PathEscape(msg) => conclave_core::ConclaveError::BadRequest(msg),
            SandboxError::SessionNotFound(id) | SandboxError::JobNotFound(id) => {
                conclave_core::ConclaveError::NotFound(id)
            }
            SandboxError::CommandBlocked { reason } => conclave_core::ConclaveError::ToolDenied(reason),
            SandboxError::Timeout { ms } => {
                conclave_core::ConclaveError::TransientNet(format!("timed out after {ms}ms"))
            }
            SandboxError::Database(e) => conclave_core::ConclaveError::Database(e.to_string()),
            SandboxError::Spawn(msg) => conclave_core::ConclaveError::Internal(msg),
            SandboxError::Io(e) => conclave_core::ConclaveError::Io(e),
        }
    }
}

use thiserror::Error;

/// Errors from session/branch/environment operations (C2a).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("branch not found: {0}")]
    BranchNotFound(i64),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("conflict: branch {0} is already streaming")]
    BranchBusy(i64),

    #[error("invalid session key: {0}")]
    InvalidKey(String),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::SessionNotFound(_) | SessionError::BranchNotFound(_) => "not-found",
            SessionError::Database(_) => "database-error",
            SessionError::BranchBusy(_) => "conflict",
            SessionError::InvalidKey(_) => "bad-request",
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl From<SessionError> for conclave_core::ConclaveError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::SessionNotFound(id) => conclave_core::ConclaveError::NotFound(id),
            SessionError::BranchNotFound(id) => conclave_core::ConclaveError::NotFound(id.to_string()),
            SessionError::Database(e) => conclave_core::ConclaveError::Database(e.to_string()),
            SessionError::BranchBusy(id) => {
                conclave_core::ConclaveError::Conflict(format!("branch {id} is already streaming"))
            }
            SessionError::InvalidKey(msg) => conclave_core::ConclaveError::BadRequest(msg),
        }
    }
}

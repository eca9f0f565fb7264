use thiserror::Error;

/// Errors from message/attachment/search operations (C2b).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("message not found: {0}")]
    MessageNotFound(i64),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("conflict: tail message {0} already has a chosen successor")]
    TailConflict(i64),

    #[error("corrupt message row: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::MessageNotFound(_) => "not-found",
            StoreError::Database(_) => "database-error",
            StoreError::TailConflict(_) => "conflict",
            StoreError::Corrupt(_) => "corrupt",
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for conclave_core::ConclaveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MessageNotFound(id) => conclave_core::ConclaveError::NotFound(id.to_string()),
            StoreError::Database(e) => conclave_core::ConclaveError::Database(e.to_string()),
            StoreError::TailConflict(id) => {
                conclave_core::ConclaveError::Conflict(format!("tail message {id} already has a chosen successor"))
            }
            StoreError::Corrupt(msg) => conclave_core::ConclaveError::Corrupt(msg),
        }
    }
}

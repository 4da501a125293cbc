use thiserror::Error;

use crate::models::SessionStatus;

/// Failures raised by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid session payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("no {kind} with id `{id}`")]
    NotFound { kind: &'static str, id: String },

    #[error("user `{user_id}` already has an active session")]
    ActiveSessionExists { user_id: String },

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Errors surfaced to callers of the session engine.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("user `{user_id}` already has an active session")]
    SessionConflict { user_id: String },

    #[error("session `{0}` not found")]
    SessionNotFound(String),

    #[error("plan `{0}` not found")]
    PlanNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cannot {action} while the session is {status}")]
    InvalidTransition {
        status: SessionStatus,
        action: &'static str,
    },

    #[error("persistence failure: {0}")]
    PersistenceFailure(#[source] StoreError),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ActiveSessionExists { user_id } => Self::SessionConflict { user_id },
            StoreError::NotFound {
                kind: "session",
                id,
            } => Self::SessionNotFound(id),
            StoreError::NotFound { kind: "plan", id } => Self::PlanNotFound(id),
            other => Self::PersistenceFailure(other),
        }
    }
}

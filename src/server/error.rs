use thiserror::Error;

/// Business-rule failures surfaced to the caller. `NotFound` deliberately
/// covers both missing targets and block relationships, so a caller cannot
/// distinguish "user does not exist" from "user blocked you".
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EngineError {
    /// Stable kind string used by the transport layer to pick a status.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Unauthorized => "unauthorized",
            EngineError::NotFound => "not_found",
            EngineError::BadRequest(_) => "bad_request",
            EngineError::Forbidden(_) => "forbidden",
            EngineError::Conflict(_) => "conflict",
            EngineError::Database(_) => "internal",
        }
    }

    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db) => db.is_unique_violation(),
            _ => false,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

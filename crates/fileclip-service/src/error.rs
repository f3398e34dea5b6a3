use fileclip_core::{ConfigError, FetchError};
use fileclip_db::DbError;
use fileclip_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClipError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("job queue error: {0}")]
    Queue(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0} record has no identifier")]
    MissingIdentifier(String),

    #[error("{0} record has no file reference")]
    MissingReference(String),

    #[error("{0}: reference changed while it was being processed")]
    Stale(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<DbError> for ClipError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => ClipError::NotFound(what),
            other => ClipError::Database(other.to_string()),
        }
    }
}

impl From<StoreError> for ClipError {
    fn from(e: StoreError) -> Self {
        ClipError::Storage(e.to_string())
    }
}

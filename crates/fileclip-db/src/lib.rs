pub mod sqlite;

pub use sqlite::SqliteDatabase;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use fileclip_core::{Attachment, Job, JobPayload, JobStatus, Record};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the SQLite file lives. `None` means the default data directory.
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    pub sqlite_path: Option<String>,
}

/// Persistence for clipped records and the background job queue.
#[async_trait]
pub trait Database: Send + Sync {
    // -- Records --
    async fn get_record(&self, type_name: &str, id: &str) -> Result<Record, DbError>;
    async fn list_records(&self, type_name: &str) -> Result<Vec<Record>, DbError>;

    /// Insert or update a record. The returned copy carries its id,
    /// timestamps and the fields this save changed.
    async fn save_record(&self, record: &Record) -> Result<Record, DbError>;

    /// Write `snapshot` back verbatim, timestamps included.
    async fn restore_record(&self, snapshot: &Record) -> Result<(), DbError>;
    async fn delete_record(&self, type_name: &str, id: &str) -> Result<(), DbError>;

    /// Write only the attachment columns, and only while the stored
    /// reference still equals `reference`. `None` when the row is gone or
    /// its reference has changed since it was read.
    async fn update_attachment(
        &self,
        type_name: &str,
        id: &str,
        reference: Option<&str>,
        attachment: &Attachment,
    ) -> Result<Option<Record>, DbError>;

    // -- Jobs --
    async fn enqueue_job(&self, payload: &JobPayload) -> Result<Job, DbError>;

    /// Atomically move the oldest queued job to running.
    async fn claim_next_job(&self) -> Result<Option<Job>, DbError>;
    async fn complete_job(&self, id: &str) -> Result<Job, DbError>;
    async fn fail_job(&self, id: &str, error_message: &str) -> Result<Job, DbError>;
    async fn get_job(&self, id: &str) -> Result<Job, DbError>;
    async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>, DbError>;

    /// Running jobs not touched since `older_than`.
    async fn find_stale_jobs(&self, older_than: DateTime<Utc>) -> Result<Vec<Job>, DbError>;

    /// Put a running job back in the queue, or fail it with `error_message`
    /// once it has used `max_attempts`. `None` if it is no longer running.
    async fn release_stale_job(
        &self,
        id: &str,
        max_attempts: i64,
        error_message: &str,
    ) -> Result<Option<Job>, DbError>;
}

/// `$XDG_DATA_HOME/fileclip`, falling back to `~/.local/share/fileclip`.
pub fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("fileclip")
}

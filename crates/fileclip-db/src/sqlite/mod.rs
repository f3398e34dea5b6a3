pub(crate) mod migrations;
pub mod queries;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use fileclip_core::{Attachment, Job, JobPayload, JobStatus, Record};

use crate::{Database, DbConfig, DbError};

/// Converts `rusqlite::Result<T>` into `Result<T, DbError>` so query code can
/// use `.to_db()?`.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    DbError::Internal(e.to_string())
}

#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::data_dir().join("fileclip.db"));
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        tracing::debug!("opened sqlite database at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        f(&conn)
    }

    fn run_migrations(&self) -> Result<(), DbError> {
        self.with_conn(migrations::run)
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(SqliteDatabase) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(db))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    // -- Records --
    async fn get_record(&self, type_name: &str, id: &str) -> Result<Record, DbError> {
        let type_name = type_name.to_string();
        let id = id.to_string();
        self.blocking(move |db| db.get_record_sync(&type_name, &id))
            .await
    }
    async fn list_records(&self, type_name: &str) -> Result<Vec<Record>, DbError> {
        let type_name = type_name.to_string();
        self.blocking(move |db| db.list_records_sync(&type_name))
            .await
    }
    async fn save_record(&self, record: &Record) -> Result<Record, DbError> {
        let record = record.clone();
        self.blocking(move |db| db.save_record_sync(&record)).await
    }
    async fn restore_record(&self, snapshot: &Record) -> Result<(), DbError> {
        let snapshot = snapshot.clone();
        self.blocking(move |db| db.restore_record_sync(&snapshot))
            .await
    }
    async fn delete_record(&self, type_name: &str, id: &str) -> Result<(), DbError> {
        let type_name = type_name.to_string();
        let id = id.to_string();
        self.blocking(move |db| db.delete_record_sync(&type_name, &id))
            .await
    }
    async fn update_attachment(
        &self,
        type_name: &str,
        id: &str,
        reference: Option<&str>,
        attachment: &Attachment,
    ) -> Result<Option<Record>, DbError> {
        let type_name = type_name.to_string();
        let id = id.to_string();
        let reference = reference.map(String::from);
        let attachment = attachment.clone();
        self.blocking(move |db| {
            db.update_attachment_sync(&type_name, &id, reference.as_deref(), &attachment)
        })
        .await
    }

    // -- Jobs --
    async fn enqueue_job(&self, payload: &JobPayload) -> Result<Job, DbError> {
        let payload = payload.clone();
        self.blocking(move |db| db.enqueue_job_sync(&payload)).await
    }
    async fn claim_next_job(&self) -> Result<Option<Job>, DbError> {
        self.blocking(|db| db.claim_next_job_sync()).await
    }
    async fn complete_job(&self, id: &str) -> Result<Job, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.finish_job_sync(&id, JobStatus::Completed, None))
            .await
    }
    async fn fail_job(&self, id: &str, error_message: &str) -> Result<Job, DbError> {
        let id = id.to_string();
        let msg = error_message.to_string();
        self.blocking(move |db| db.finish_job_sync(&id, JobStatus::Failed, Some(&msg)))
            .await
    }
    async fn get_job(&self, id: &str) -> Result<Job, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.get_job_sync(&id)).await
    }
    async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>, DbError> {
        self.blocking(move |db| db.list_jobs_sync(status)).await
    }
    async fn find_stale_jobs(&self, older_than: DateTime<Utc>) -> Result<Vec<Job>, DbError> {
        self.blocking(move |db| db.find_stale_jobs_sync(older_than))
            .await
    }
    async fn release_stale_job(
        &self,
        id: &str,
        max_attempts: i64,
        error_message: &str,
    ) -> Result<Option<Job>, DbError> {
        let id = id.to_string();
        let msg = error_message.to_string();
        self.blocking(move |db| db.release_stale_job_sync(&id, max_attempts, &msg))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_runs_migrations() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('records', 'jobs')",
                    [],
                    |row| row.get(0),
                )
                .to_db()?;
            assert_eq!(count, 2);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn open_path_creates_file_and_reopens() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("fileclip.db");
        let config = DbConfig {
            sqlite_path: Some(db_path.to_string_lossy().to_string()),
        };

        SqliteDatabase::open(&config).unwrap();
        assert!(db_path.exists());
        // Migrations are idempotent.
        SqliteDatabase::open(&config).unwrap();
    }
}

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

use fileclip_core::{Job, JobPayload, JobStatus};

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_job(row: &Row) -> rusqlite::Result<Job> {
    let status_str: String = row.get("status")?;
    let status = JobStatus::parse_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            row.as_ref().column_index("status").unwrap_or(0),
            Type::Text,
            format!("unknown job status '{status_str}'").into(),
        )
    })?;
    Ok(Job {
        id: row.get("id")?,
        payload: JobPayload {
            type_name: row.get("type_name")?,
            id: row.get("record_id")?,
        },
        status,
        error_message: row.get("error_message")?,
        attempts: row.get("attempts")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl SqliteDatabase {
    pub fn enqueue_job_sync(&self, payload: &JobPayload) -> Result<Job, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();
            conn.query_row(
                "INSERT INTO jobs (id, type_name, record_id, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'queued', ?4, ?4)
                 RETURNING *",
                params![id, payload.type_name, payload.id, now],
                row_to_job,
            )
            .to_db()
        })
    }

    /// Claim the oldest queued job, setting it to running and counting the attempt.
    /// Returns `None` when the queue is empty.
    pub fn claim_next_job_sync(&self) -> Result<Option<Job>, DbError> {
        self.with_conn(|conn| {
            let now = Utc::now();
            conn.query_row(
                "UPDATE jobs
                 SET status = 'running', attempts = attempts + 1, updated_at = ?1
                 WHERE id = (
                     SELECT id FROM jobs
                     WHERE status = 'queued'
                     ORDER BY rowid ASC
                     LIMIT 1
                 )
                 RETURNING *",
                params![now],
                row_to_job,
            )
            .optional()
            .to_db()
        })
    }

    pub fn finish_job_sync(
        &self,
        id: &str,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<Job, DbError> {
        self.with_conn(|conn| {
            let now = Utc::now();
            conn.query_row(
                "UPDATE jobs SET status = ?1, error_message = ?2, updated_at = ?3
                 WHERE id = ?4
                 RETURNING *",
                params![status.as_str(), error_message, now, id],
                row_to_job,
            )
            .optional()
            .to_db()?
            .ok_or_else(|| DbError::NotFound(format!("job {id}")))
        })
    }

    pub fn get_job_sync(&self, id: &str) -> Result<Job, DbError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT * FROM jobs WHERE id = ?1", params![id], row_to_job)
                .optional()
                .to_db()?
                .ok_or_else(|| DbError::NotFound(format!("job {id}")))
        })
    }

    pub fn list_jobs_sync(&self, status: Option<JobStatus>) -> Result<Vec<Job>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM jobs
                     WHERE ?1 IS NULL OR status = ?1
                     ORDER BY rowid ASC",
                )
                .to_db()?;
            let jobs = stmt
                .query_map(params![status.map(|s| s.as_str())], row_to_job)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(jobs)
        })
    }

    pub fn find_stale_jobs_sync(&self, older_than: DateTime<Utc>) -> Result<Vec<Job>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM jobs
                     WHERE status = 'running' AND updated_at < ?1
                     ORDER BY rowid ASC",
                )
                .to_db()?;
            let jobs = stmt
                .query_map(params![older_than], row_to_job)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(jobs)
        })
    }

    /// Requeue a running job, or fail it once `max_attempts` is used up.
    /// Returns `None` if the job already left the running state.
    pub fn release_stale_job_sync(
        &self,
        id: &str,
        max_attempts: i64,
        error_message: &str,
    ) -> Result<Option<Job>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "UPDATE jobs SET
                     status = CASE WHEN attempts >= ?2 THEN 'failed' ELSE 'queued' END,
                     error_message = CASE WHEN attempts >= ?2 THEN ?3 ELSE error_message END,
                     updated_at = ?4
                 WHERE id = ?1 AND status = 'running'
                 RETURNING *",
                params![id, max_attempts, error_message, Utc::now()],
                row_to_job,
            )
            .optional()
            .to_db()
        })
    }
}

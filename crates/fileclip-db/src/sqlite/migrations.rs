use rusqlite::Connection;

use super::SqliteResultExt;
use crate::DbError;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS records (
            id                      TEXT PRIMARY KEY,
            type_name               TEXT NOT NULL,
            filepicker_url          TEXT,
            attachment_source       TEXT,
            attachment_content_type TEXT,
            attachment_file_name    TEXT,
            attachment_file_size    INTEGER,
            attachment_store_key    TEXT,
            created_at              TEXT NOT NULL,
            updated_at              TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_records_type ON records(type_name);

        CREATE TABLE IF NOT EXISTS jobs (
            id            TEXT PRIMARY KEY,
            type_name     TEXT NOT NULL,
            record_id     TEXT,
            status        TEXT NOT NULL DEFAULT 'queued'
                              CHECK(status IN ('queued', 'running', 'completed', 'failed')),
            error_message TEXT,
            attempts      INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
        ",
    )
    .to_db()?;
    Ok(())
}

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use fileclip_core::{Attachment, Record};

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_record(row: &Row) -> rusqlite::Result<Record> {
    Ok(Record {
        type_name: row.get("type_name")?,
        id: Some(row.get("id")?),
        filepicker_url: row.get("filepicker_url")?,
        attachment: Attachment {
            source: row.get("attachment_source")?,
            content_type: row.get("attachment_content_type")?,
            file_name: row.get("attachment_file_name")?,
            file_size: row.get("attachment_file_size")?,
            store_key: row.get("attachment_store_key")?,
        },
        previous_changes: Vec::new(),
        created_at: Some(row.get("created_at")?),
        updated_at: Some(row.get("updated_at")?),
    })
}

fn find_record(
    conn: &rusqlite::Connection,
    type_name: &str,
    id: &str,
) -> Result<Option<Record>, DbError> {
    conn.query_row(
        "SELECT * FROM records WHERE type_name = ?1 AND id = ?2",
        params![type_name, id],
        row_to_record,
    )
    .optional()
    .to_db()
}

impl SqliteDatabase {
    pub fn get_record_sync(&self, type_name: &str, id: &str) -> Result<Record, DbError> {
        self.with_conn(|conn| {
            find_record(conn, type_name, id)?
                .ok_or_else(|| DbError::NotFound(format!("{type_name} {id}")))
        })
    }

    pub fn list_records_sync(&self, type_name: &str) -> Result<Vec<Record>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM records WHERE type_name = ?1 ORDER BY created_at ASC")
                .to_db()?;
            let records = stmt
                .query_map(params![type_name], row_to_record)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(records)
        })
    }

    /// Insert or update, reporting the changed field names on the returned record.
    pub fn save_record_sync(&self, record: &Record) -> Result<Record, DbError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().to_db()?;
            let stored = match &record.id {
                Some(id) => find_record(&tx, &record.type_name, id)?,
                None => None,
            };
            let changes = record.diff(stored.as_ref());
            let now = Utc::now();
            let a = &record.attachment;

            let id = match stored {
                Some(stored) => {
                    let id = stored.id.unwrap_or_default();
                    tx.execute(
                        "UPDATE records SET
                             filepicker_url = ?1,
                             attachment_source = ?2,
                             attachment_content_type = ?3,
                             attachment_file_name = ?4,
                             attachment_file_size = ?5,
                             attachment_store_key = ?6,
                             updated_at = ?7
                         WHERE type_name = ?8 AND id = ?9",
                        params![
                            record.filepicker_url,
                            a.source,
                            a.content_type,
                            a.file_name,
                            a.file_size,
                            a.store_key,
                            now,
                            record.type_name,
                            id
                        ],
                    )
                    .to_db()?;
                    id
                }
                None => {
                    let id = record
                        .id
                        .clone()
                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                    tx.execute(
                        "INSERT INTO records (
                             id, type_name, filepicker_url, attachment_source,
                             attachment_content_type, attachment_file_name,
                             attachment_file_size, attachment_store_key,
                             created_at, updated_at
                         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                        params![
                            id,
                            record.type_name,
                            record.filepicker_url,
                            a.source,
                            a.content_type,
                            a.file_name,
                            a.file_size,
                            a.store_key,
                            now
                        ],
                    )
                    .to_db()?;
                    id
                }
            };

            let mut saved = find_record(&tx, &record.type_name, &id)?
                .ok_or_else(|| DbError::Internal(format!("{} {id} vanished", record.type_name)))?;
            tx.commit().to_db()?;
            saved.previous_changes = changes;
            Ok(saved)
        })
    }

    pub fn restore_record_sync(&self, snapshot: &Record) -> Result<(), DbError> {
        let (Some(id), Some(created_at), Some(updated_at)) =
            (&snapshot.id, snapshot.created_at, snapshot.updated_at)
        else {
            return Err(DbError::Internal(format!(
                "cannot restore unsaved {} record",
                snapshot.type_name
            )));
        };
        self.with_conn(|conn| {
            let a = &snapshot.attachment;
            conn.execute(
                "INSERT OR REPLACE INTO records (
                     id, type_name, filepicker_url, attachment_source,
                     attachment_content_type, attachment_file_name,
                     attachment_file_size, attachment_store_key,
                     created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id,
                    snapshot.type_name,
                    snapshot.filepicker_url,
                    a.source,
                    a.content_type,
                    a.file_name,
                    a.file_size,
                    a.store_key,
                    created_at,
                    updated_at
                ],
            )
            .to_db()?;
            Ok(())
        })
    }

    pub fn delete_record_sync(&self, type_name: &str, id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM records WHERE type_name = ?1 AND id = ?2",
                params![type_name, id],
            )
            .to_db()?;
            Ok(())
        })
    }

    /// Attachment-only write guarded by the reference it was derived from.
    pub fn update_attachment_sync(
        &self,
        type_name: &str,
        id: &str,
        reference: Option<&str>,
        attachment: &Attachment,
    ) -> Result<Option<Record>, DbError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().to_db()?;
            let Some(stored) = find_record(&tx, type_name, id)? else {
                return Ok(None);
            };
            if stored.filepicker_url.as_deref() != reference {
                return Ok(None);
            }

            let mut candidate = stored.clone();
            candidate.attachment = attachment.clone();
            let changes = candidate.diff(Some(&stored));
            let a = attachment;
            tx.execute(
                "UPDATE records SET
                     attachment_source = ?1,
                     attachment_content_type = ?2,
                     attachment_file_name = ?3,
                     attachment_file_size = ?4,
                     attachment_store_key = ?5,
                     updated_at = ?6
                 WHERE type_name = ?7 AND id = ?8",
                params![
                    a.source,
                    a.content_type,
                    a.file_name,
                    a.file_size,
                    a.store_key,
                    Utc::now(),
                    type_name,
                    id
                ],
            )
            .to_db()?;

            let mut saved = find_record(&tx, type_name, id)?
                .ok_or_else(|| DbError::Internal(format!("{type_name} {id} vanished")))?;
            tx.commit().to_db()?;
            saved.previous_changes = changes;
            Ok(Some(saved))
        })
    }
}

#[cfg(test)]
mod tests {
    use fileclip_core::record::fields;

    use super::*;

    const URL: &str = "https://www.filepicker.io/api/file/ibOold9OQfqbmzgP6D3O";

    #[test]
    fn insert_assigns_id_and_reports_changes() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let saved = db
            .save_record_sync(&Record::new("Image").with_reference(URL))
            .unwrap();

        assert!(saved.id.is_some());
        assert!(saved.created_at.is_some());
        assert_eq!(saved.filepicker_url.as_deref(), Some(URL));
        assert_eq!(saved.previous_changes, vec![fields::FILEPICKER_URL.to_string()]);
    }

    #[test]
    fn update_reports_only_what_changed() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let mut saved = db
            .save_record_sync(&Record::new("Image").with_reference(URL))
            .unwrap();

        let unchanged = db.save_record_sync(&saved).unwrap();
        assert!(unchanged.previous_changes.is_empty());
        assert_eq!(unchanged.id, saved.id);

        saved.attachment.file_name = Some("140x100.gif".into());
        let updated = db.save_record_sync(&saved).unwrap();
        assert_eq!(
            updated.previous_changes,
            vec![fields::ATTACHMENT_FILE_NAME.to_string()]
        );
        assert_eq!(updated.attachment.file_name.as_deref(), Some("140x100.gif"));
    }

    #[test]
    fn records_are_scoped_by_type() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let saved = db.save_record_sync(&Record::new("Image")).unwrap();
        let id = saved.id.unwrap();

        assert!(db.get_record_sync("Image", &id).is_ok());
        let err = db.get_record_sync("Document", &id).unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn restore_rewrites_snapshot_verbatim() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let original = db
            .save_record_sync(&Record::new("Image").with_reference(URL))
            .unwrap();

        let mut changed = original.clone();
        changed.filepicker_url = Some("https://www.filepicker.io/api/file/other".into());
        db.save_record_sync(&changed).unwrap();

        db.restore_record_sync(&original).unwrap();
        let id = original.id.clone().unwrap();
        let restored = db.get_record_sync("Image", &id).unwrap();
        assert_eq!(restored.filepicker_url.as_deref(), Some(URL));
        assert_eq!(restored.updated_at, original.updated_at);
    }

    #[test]
    fn restore_requires_a_saved_snapshot() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        assert!(db.restore_record_sync(&Record::new("Image")).is_err());
    }

    #[test]
    fn delete_and_list() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let a = db.save_record_sync(&Record::new("Image")).unwrap();
        db.save_record_sync(&Record::new("Image")).unwrap();
        db.save_record_sync(&Record::new("Document")).unwrap();

        assert_eq!(db.list_records_sync("Image").unwrap().len(), 2);
        db.delete_record_sync("Image", a.id.as_deref().unwrap()).unwrap();
        assert_eq!(db.list_records_sync("Image").unwrap().len(), 1);
        assert_eq!(db.list_records_sync("Document").unwrap().len(), 1);
    }

    fn gif() -> Attachment {
        Attachment {
            source: Some(URL.into()),
            content_type: Some("image/gif".into()),
            file_name: Some("140x100.gif".into()),
            file_size: Some(449),
            store_key: None,
        }
    }

    #[test]
    fn update_attachment_leaves_reference_alone() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let saved = db
            .save_record_sync(&Record::new("Image").with_reference(URL))
            .unwrap();
        let id = saved.id.as_deref().unwrap();

        let updated = db
            .update_attachment_sync("Image", id, Some(URL), &gif())
            .unwrap()
            .unwrap();
        assert_eq!(updated.filepicker_url.as_deref(), Some(URL));
        assert_eq!(updated.attachment, gif());
        assert!(!updated
            .previous_changes
            .contains(&fields::FILEPICKER_URL.to_string()));
        assert!(updated
            .previous_changes
            .contains(&fields::ATTACHMENT_FILE_SIZE.to_string()));
    }

    #[test]
    fn update_attachment_skips_moved_reference() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let mut saved = db
            .save_record_sync(&Record::new("Image").with_reference(URL))
            .unwrap();
        let id = saved.id.clone().unwrap();

        let newer = "https://www.filepicker.io/api/file/other";
        saved.filepicker_url = Some(newer.into());
        db.save_record_sync(&saved).unwrap();

        assert!(db
            .update_attachment_sync("Image", &id, Some(URL), &gif())
            .unwrap()
            .is_none());
        let stored = db.get_record_sync("Image", &id).unwrap();
        assert_eq!(stored.filepicker_url.as_deref(), Some(newer));
        assert_eq!(stored.attachment, Attachment::default());

        assert!(db
            .update_attachment_sync("Image", "missing", Some(URL), &gif())
            .unwrap()
            .is_none());
    }
}

// Exercises the async Database trait against SQLite, the way the clip
// service drives it.

use fileclip_core::record::fields;
use fileclip_core::{JobPayload, JobStatus, Record};
use fileclip_db::{Database, DbError, SqliteDatabase};

const URL: &str = "https://www.filepicker.io/api/file/ibOold9OQfqbmzgP6D3O";

fn open() -> SqliteDatabase {
    SqliteDatabase::open_in_memory().unwrap()
}

async fn record_lifecycle(db: &dyn Database) {
    let saved = db
        .save_record(&Record::new("Image").with_reference(URL))
        .await
        .unwrap();
    let id = saved.id.clone().unwrap();
    assert_eq!(saved.previous_changes, vec![fields::FILEPICKER_URL.to_string()]);

    // Reloading drops the change set; it only describes the last save.
    let loaded = db.get_record("Image", &id).await.unwrap();
    assert!(loaded.previous_changes.is_empty());
    assert_eq!(loaded.filepicker_url.as_deref(), Some(URL));

    let resaved = db.save_record(&loaded).await.unwrap();
    assert!(resaved.previous_changes.is_empty());

    db.delete_record("Image", &id).await.unwrap();
    assert!(matches!(
        db.get_record("Image", &id).await.unwrap_err(),
        DbError::NotFound(_)
    ));
}

async fn job_queue(db: &dyn Database) {
    let job = db
        .enqueue_job(&JobPayload {
            type_name: "Image".into(),
            id: None,
        })
        .await
        .unwrap();

    let claimed = db.claim_next_job().await.unwrap().unwrap();
    assert_eq!(claimed.id, job.id);
    assert!(db.claim_next_job().await.unwrap().is_none());

    let failed = db.fail_job(&job.id, "boom").await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(db.get_job(&job.id).await.unwrap().attempts, 1);
    assert_eq!(db.list_jobs(Some(JobStatus::Failed)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_record_lifecycle() {
    record_lifecycle(&open()).await;
}

#[tokio::test]
async fn sqlite_job_queue() {
    job_queue(&open()).await;
}

#[tokio::test]
async fn sqlite_file_database_persists_across_handles() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("fileclip.db");

    let id = {
        let db = SqliteDatabase::open_path(&path).unwrap();
        let saved = db
            .save_record(&Record::new("Image").with_reference(URL))
            .await
            .unwrap();
        saved.id.unwrap()
    };

    let db = SqliteDatabase::open_path(&path).unwrap();
    let loaded = db.get_record("Image", &id).await.unwrap();
    assert_eq!(loaded.filepicker_url.as_deref(), Some(URL));
}

//! Storage for attachment bytes mirrored from the upload service.

mod config;
mod local;
#[cfg(feature = "s3")]
mod s3;

pub use config::{S3Config, StoreConfig};
pub use local::LocalStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("store configuration: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Internal(String),
}

/// Where attachment bytes end up once mirrored.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Where objects live, for logs.
    fn describe(&self) -> String;

    /// Create or replace the object at `key`.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Remove the object at `key`. Removing a missing object succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Key for an attachment's bytes, e.g. `records/Image/42/attachment/140x100.gif`.
pub fn attachment_key(
    type_name: &str,
    record_id: &str,
    attachment_name: &str,
    file_name: &str,
) -> String {
    format!(
        "records/{}/{}/{}/{}",
        sanitize_segment(type_name),
        sanitize_segment(record_id),
        sanitize_segment(attachment_name),
        sanitize_segment(file_name)
    )
}

// Remote file names are untrusted; keep them to a single path segment.
fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.trim() {
        "" | "." | ".." => "_".to_string(),
        s => s.to_string(),
    }
}

pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>, StoreError> {
    let store: Arc<dyn ObjectStore> = match config {
        StoreConfig::Local { dir } => Arc::new(LocalStore::open(
            dir.clone().unwrap_or_else(local::default_root),
        )),
        #[cfg(feature = "s3")]
        StoreConfig::S3(s3) => Arc::new(S3Store::new(s3)?),
        #[cfg(not(feature = "s3"))]
        StoreConfig::S3(_) => {
            return Err(StoreError::Config(
                "S3 bucket configured but the 's3' feature is not enabled".into(),
            ))
        }
    };
    tracing::info!("object store: {}", store.describe());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_key_layout() {
        assert_eq!(
            attachment_key("Image", "42", "attachment", "140x100.gif"),
            "records/Image/42/attachment/140x100.gif"
        );
    }

    #[test]
    fn attachment_key_neutralizes_path_tricks() {
        assert_eq!(
            attachment_key("Image", "42", "attachment", "../../etc/passwd"),
            "records/Image/42/attachment/.._.._etc_passwd"
        );
        assert_eq!(
            attachment_key("Image", "42", "attachment", ".."),
            "records/Image/42/attachment/_"
        );
        assert_eq!(
            attachment_key("Image", "42", "attachment", "  "),
            "records/Image/42/attachment/_"
        );
    }

    #[tokio::test]
    async fn create_store_uses_local_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = create_store(&StoreConfig::local(tmp.path())).unwrap();
        assert!(store.describe().contains(&*tmp.path().to_string_lossy()));

        let key = attachment_key("Image", "1", "attachment", "pixel.gif");
        store
            .put(&key, Bytes::from_static(b"GIF89a"), "image/gif")
            .await
            .unwrap();
        assert!(tmp.path().join(&key).exists());
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use fileclip_core::{FileMetadata, Record};
use fileclip_store::{attachment_key, ObjectStore};
use reqwest::{Client, Response};

use crate::ClipError;

/// The storage side of attachment assignment.
#[async_trait]
pub trait AttachmentStorage: Send + Sync {
    /// Take ownership of the remote file for `record`. Returns the object
    /// store key, or `None` when the attachment keeps pointing at the
    /// remote source.
    async fn store(
        &self,
        record: &Record,
        attachment_name: &str,
        reference: &str,
        metadata: &FileMetadata,
    ) -> Result<Option<String>, ClipError>;

    /// Drop a stored copy that no record points at any more.
    async fn discard(&self, _store_key: &str) -> Result<(), ClipError> {
        Ok(())
    }
}

/// Leaves the bytes with the upload service.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoteOnly;

#[async_trait]
impl AttachmentStorage for RemoteOnly {
    async fn store(
        &self,
        _record: &Record,
        _attachment_name: &str,
        _reference: &str,
        _metadata: &FileMetadata,
    ) -> Result<Option<String>, ClipError> {
        Ok(None)
    }
}

/// Downloads the remote file and writes it to an [`ObjectStore`].
pub struct MirroredStorage {
    store: Arc<dyn ObjectStore>,
    client: Client,
}

impl MirroredStorage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_client(store, Client::new())
    }

    pub fn with_client(store: Arc<dyn ObjectStore>, client: Client) -> Self {
        Self { store, client }
    }
}

#[async_trait]
impl AttachmentStorage for MirroredStorage {
    async fn store(
        &self,
        record: &Record,
        attachment_name: &str,
        reference: &str,
        metadata: &FileMetadata,
    ) -> Result<Option<String>, ClipError> {
        let id = record
            .id
            .as_deref()
            .ok_or_else(|| ClipError::MissingIdentifier(record.type_name.clone()))?;

        let resp = self
            .client
            .get(reference)
            .send()
            .await
            .map_err(|e| ClipError::Storage(format!("download {reference}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClipError::Storage(format!(
                "download {reference}: status {status}"
            )));
        }
        let data = read_capped(resp, reference, metadata.size).await?;

        let key = attachment_key(&record.type_name, id, attachment_name, &metadata.file_name);
        self.store.put(&key, data, &metadata.content_type).await?;
        tracing::debug!("mirrored {reference} to {key}");
        Ok(Some(key))
    }

    async fn discard(&self, store_key: &str) -> Result<(), ClipError> {
        self.store.delete(store_key).await?;
        tracing::debug!("discarded {store_key}");
        Ok(())
    }
}

// Preallocate at most this much from the reported size.
const MAX_PREALLOC: usize = 8 * 1024 * 1024;

/// Read the body, refusing anything larger than the metadata reported.
async fn read_capped(
    mut resp: Response,
    reference: &str,
    reported: i64,
) -> Result<Bytes, ClipError> {
    let limit = usize::try_from(reported)
        .map_err(|_| ClipError::Storage(format!("download {reference}: bad size {reported}")))?;
    let too_large = || {
        ClipError::Storage(format!(
            "download {reference}: body exceeds the reported {reported} bytes"
        ))
    };
    if resp.content_length().is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }

    let mut buf = BytesMut::with_capacity(limit.min(MAX_PREALLOC));
    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|e| ClipError::Storage(format!("download {reference}: {e}")))?
    {
        if buf.len() + chunk.len() > limit {
            return Err(too_large());
        }
        buf.extend_from_slice(&chunk);
    }
    if buf.len() < limit {
        tracing::warn!(
            "{reference}: downloaded {} bytes, metadata reported {reported}",
            buf.len()
        );
    }
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn remote_only_keeps_nothing() {
        let metadata = FileMetadata {
            content_type: "image/gif".into(),
            file_name: "140x100.gif".into(),
            size: 449,
        };
        let key = RemoteOnly
            .store(&Record::new("Image"), "attachment", "https://example.com/f", &metadata)
            .await
            .unwrap();
        assert_eq!(key, None);
    }

    #[tokio::test]
    async fn mirrored_requires_saved_record() {
        let tmp = tempfile::tempdir().unwrap();
        let store =
            fileclip_store::create_store(&fileclip_store::StoreConfig::local(tmp.path())).unwrap();
        let metadata = FileMetadata {
            content_type: "image/gif".into(),
            file_name: "140x100.gif".into(),
            size: 449,
        };

        let err = MirroredStorage::new(store)
            .store(&Record::new("Image"), "attachment", "https://example.com/f", &metadata)
            .await
            .unwrap_err();
        assert!(matches!(err, ClipError::MissingIdentifier(_)));
    }
}

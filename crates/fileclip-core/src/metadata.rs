use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::record::Attachment;

/// Metadata reported by the upload service for a remote file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(rename = "mimetype")]
    pub content_type: String,
    #[serde(rename = "filename")]
    pub file_name: String,
    pub size: i64,
}

impl FileMetadata {
    /// Parse a metadata response body. Unknown keys are ignored.
    pub fn parse(body: &[u8]) -> Result<Self, FetchError> {
        let metadata: FileMetadata =
            serde_json::from_slice(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
        if metadata.size < 0 {
            return Err(FetchError::Malformed(format!(
                "negative size {}",
                metadata.size
            )));
        }
        Ok(metadata)
    }

    /// Build the attachment this metadata describes for `source`.
    pub fn to_attachment(&self, source: &str, store_key: Option<String>) -> Attachment {
        Attachment {
            source: Some(source.to_string()),
            content_type: Some(self.content_type.clone()),
            file_name: Some(self.file_name.clone()),
            file_size: Some(self.size),
            store_key,
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Names reported in a record's change set.
pub mod fields {
    pub const FILEPICKER_URL: &str = "filepicker_url";
    pub const ATTACHMENT_SOURCE: &str = "attachment_source";
    pub const ATTACHMENT_CONTENT_TYPE: &str = "attachment_content_type";
    pub const ATTACHMENT_FILE_NAME: &str = "attachment_file_name";
    pub const ATTACHMENT_FILE_SIZE: &str = "attachment_file_size";
    pub const ATTACHMENT_STORE_KEY: &str = "attachment_store_key";
}

/// The local side of an attached file and its derived attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Remote reference the file was taken from.
    pub source: Option<String>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    /// Object store key, when the bytes were mirrored locally.
    #[serde(default)]
    pub store_key: Option<String>,
}

impl Attachment {
    pub fn is_present(&self) -> bool {
        self.source.is_some() || self.store_key.is_some()
    }
}

/// A persisted entity carrying a remote file reference and an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub type_name: String,
    /// Assigned by the persistence layer on first save.
    pub id: Option<String>,
    pub filepicker_url: Option<String>,
    #[serde(default)]
    pub attachment: Attachment,
    /// Fields changed by the most recently completed save.
    #[serde(default)]
    pub previous_changes: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            id: None,
            filepicker_url: None,
            attachment: Attachment::default(),
            previous_changes: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_reference(mut self, url: &str) -> Self {
        self.filepicker_url = Some(url.to_string());
        self
    }

    /// The reference, if it holds anything other than whitespace.
    pub fn reference(&self) -> Option<&str> {
        self.filepicker_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Field names whose values differ from `stored`.
    ///
    /// With no stored row every non-empty field counts as changed.
    pub fn diff(&self, stored: Option<&Record>) -> Vec<String> {
        let blank = Record::new(&self.type_name);
        let before = stored.unwrap_or(&blank);
        let a = &self.attachment;
        let b = &before.attachment;

        let mut changed = Vec::new();
        if self.filepicker_url != before.filepicker_url {
            changed.push(fields::FILEPICKER_URL.to_string());
        }
        if a.source != b.source {
            changed.push(fields::ATTACHMENT_SOURCE.to_string());
        }
        if a.content_type != b.content_type {
            changed.push(fields::ATTACHMENT_CONTENT_TYPE.to_string());
        }
        if a.file_name != b.file_name {
            changed.push(fields::ATTACHMENT_FILE_NAME.to_string());
        }
        if a.file_size != b.file_size {
            changed.push(fields::ATTACHMENT_FILE_SIZE.to_string());
        }
        if a.store_key != b.store_key {
            changed.push(fields::ATTACHMENT_STORE_KEY.to_string());
        }
        changed
    }
}

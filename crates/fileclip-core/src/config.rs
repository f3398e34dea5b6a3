use crate::error::ConfigError;
use crate::record::fields;

/// How one record type is wired to its attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipConfig {
    /// Name of the attachment field, used for storage keys and logging.
    pub attachment_name: String,
    /// Changed fields that trigger processing.
    pub change_keys: Vec<String>,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self::new("attachment")
    }
}

impl ClipConfig {
    pub fn new(attachment_name: &str) -> Self {
        Self {
            attachment_name: attachment_name.to_string(),
            change_keys: vec![fields::FILEPICKER_URL.to_string()],
        }
    }

    /// Also trigger when `key` changed.
    pub fn with_change_key(mut self, key: &str) -> Self {
        if !self.change_keys.iter().any(|k| k == key) {
            self.change_keys.push(key.to_string());
        }
        self
    }

    pub fn validate(&self, type_name: &str) -> Result<(), ConfigError> {
        if type_name.trim().is_empty() {
            return Err(ConfigError::EmptyTypeName);
        }
        if self.attachment_name.trim().is_empty() {
            return Err(ConfigError::MissingAttachment(type_name.to_string()));
        }
        if self.change_keys.is_empty() {
            return Err(ConfigError::NoChangeKeys(type_name.to_string()));
        }
        Ok(())
    }
}

//! Decides whether a completed save should trigger remote-file processing.

use crate::config::ClipConfig;
use crate::record::Record;

/// True when the record holds a non-empty reference.
pub fn reference_present(record: &Record) -> bool {
    record.reference().is_some()
}

/// True when any of the configured change keys changed in the last save.
pub fn previously_changed(record: &Record, config: &ClipConfig) -> bool {
    record
        .previous_changes
        .iter()
        .any(|changed| config.change_keys.iter().any(|key| key == changed))
}

pub fn should_process(record: &Record, config: &ClipConfig) -> bool {
    reference_present(record) && previously_changed(record, config)
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// What a job runner needs to reload and reprocess a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    pub type_name: String,
    /// `None` when the record had not been assigned an id yet.
    pub id: Option<String>,
}

impl JobPayload {
    pub fn for_record(record: &Record) -> Self {
        Self {
            type_name: record.type_name.clone(),
            id: record.id.clone(),
        }
    }
}

impl fmt::Display for JobPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}#{id}", self.type_name),
            None => write!(f, "{}#<unsaved>", self.type_name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued unit of background processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub payload: JobPayload,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub attempts: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_tolerates_unsaved_record() {
        let record = Record::new("Image").with_reference("https://example.com/f");
        let payload = JobPayload::for_record(&record);
        assert_eq!(
            payload,
            JobPayload {
                type_name: "Image".into(),
                id: None,
            }
        );
        assert_eq!(payload.to_string(), "Image#<unsaved>");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"type_name": "Image", "id": null}));
    }

    #[test]
    fn payload_display_with_id() {
        let payload = JobPayload {
            type_name: "Image".into(),
            id: Some("abc".into()),
        };
        assert_eq!(payload.to_string(), "Image#abc");
    }

    #[test]
    fn job_status_parse_str_all() {
        for status in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse_str(status.as_str()), Some(status));
            assert_eq!(format!("{status}"), status.as_str());
        }
        assert_eq!(JobStatus::parse_str("pending"), None);
        assert_eq!(JobStatus::parse_str(""), None);
    }
}

pub mod change;
pub mod config;
pub mod error;
pub mod job;
pub mod metadata;
pub mod record;
pub mod strategy;

pub use config::ClipConfig;
pub use error::{ConfigError, FetchError};
pub use job::{Job, JobPayload, JobStatus};
pub use metadata::FileMetadata;
pub use record::{Attachment, Record};
pub use strategy::Strategy;

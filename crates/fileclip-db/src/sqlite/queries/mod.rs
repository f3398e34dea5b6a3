pub mod jobs;
pub mod records;

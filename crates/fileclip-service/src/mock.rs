//! In-memory collaborators for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use fileclip_core::{FetchError, FileMetadata, JobPayload};

use crate::fetcher::MetadataFetcher;
use crate::queue::JobBackend;
use crate::ClipError;

/// Answers every fetch with the same metadata and counts the calls.
pub struct StaticFetcher {
    metadata: FileMetadata,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new(content_type: &str, file_name: &str, size: i64) -> Self {
        Self {
            metadata: FileMetadata {
                content_type: content_type.to_string(),
                file_name: file_name.to_string(),
                size,
            },
            calls: AtomicUsize::new(0),
        }
    }

    /// The 140x100 GIF the upload service tests are built around.
    pub fn gif() -> Self {
        Self::new("image/gif", "140x100.gif", 449)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataFetcher for StaticFetcher {
    async fn fetch(&self, _reference: &str) -> Result<FileMetadata, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.metadata.clone())
    }
}

/// Fails every fetch as if the endpoint were down.
#[derive(Default)]
pub struct UnreachableFetcher;

#[async_trait]
impl MetadataFetcher for UnreachableFetcher {
    async fn fetch(&self, reference: &str) -> Result<FileMetadata, FetchError> {
        Err(FetchError::Unreachable(format!("{reference}: connection refused")))
    }
}

/// Keeps enqueued payloads in memory.
#[derive(Default)]
pub struct RecordingJobBackend {
    payloads: Mutex<Vec<JobPayload>>,
}

impl RecordingJobBackend {
    pub fn payloads(&self) -> Vec<JobPayload> {
        self.payloads
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl JobBackend for RecordingJobBackend {
    fn name(&self) -> &str {
        "recording"
    }

    async fn enqueue(&self, payload: &JobPayload) -> Result<(), ClipError> {
        self.payloads
            .lock()
            .map_err(|_| ClipError::Queue("lock poisoned".into()))?
            .push(payload.clone());
        Ok(())
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use fileclip_core::JobPayload;
use fileclip_db::Database;

use crate::ClipError;

/// Accepts payloads for asynchronous processing outside the request path.
#[async_trait]
pub trait JobBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Returns once the payload is accepted; never waits for the job to run.
    async fn enqueue(&self, payload: &JobPayload) -> Result<(), ClipError>;
}

/// Job backend that queues payloads in the `jobs` table for a [`crate::Worker`].
pub struct DbJobQueue {
    db: Arc<dyn Database>,
}

impl DbJobQueue {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobBackend for DbJobQueue {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn enqueue(&self, payload: &JobPayload) -> Result<(), ClipError> {
        let job = self
            .db
            .enqueue_job(payload)
            .await
            .map_err(|e| ClipError::Queue(e.to_string()))?;
        tracing::info!("enqueued job {} for {payload}", job.id);
        Ok(())
    }
}

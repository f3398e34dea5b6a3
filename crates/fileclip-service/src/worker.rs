use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fileclip_core::Job;
use tracing::{error, info, warn};

use crate::{ClipError, ClipService};

const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(15 * 60);
const DEFAULT_MAX_ATTEMPTS: i64 = 3;

/// Drains the SQLite job queue, processing one record per job.
///
/// Jobs left `running` by a worker that died are requeued once they have
/// not been touched for `stale_after`, until `max_attempts` claims are used
/// up; then they are failed.
pub struct Worker {
    service: Arc<ClipService>,
    poll_interval: Duration,
    stale_after: Duration,
    max_attempts: i64,
}

impl Worker {
    pub fn new(service: Arc<ClipService>, poll_interval: Duration) -> Self {
        Self {
            service,
            poll_interval,
            stale_after: DEFAULT_STALE_AFTER,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i64) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Release jobs stuck in `running`. Returns how many were released.
    pub async fn reclaim_stale(&self) -> Result<usize, ClipError> {
        let db = self.service.database();
        let stale_after = chrono::Duration::from_std(self.stale_after)
            .unwrap_or_else(|_| chrono::Duration::minutes(15));
        let stale = db.find_stale_jobs(Utc::now() - stale_after).await?;

        let mut released = 0;
        for job in stale {
            let message = format!(
                "abandoned while running, {} of {} attempts used",
                job.attempts, self.max_attempts
            );
            if let Some(job) = db
                .release_stale_job(&job.id, self.max_attempts, &message)
                .await?
            {
                warn!("released stale job {} ({}) as {}", job.id, job.payload, job.status);
                released += 1;
            }
        }
        Ok(released)
    }

    /// Claim and run at most one job. Returns the finished job, or `None`
    /// when the queue was empty. A failing job is recorded, not returned
    /// as an error.
    pub async fn run_once(&self) -> Result<Option<Job>, ClipError> {
        let db = self.service.database();
        let Some(job) = db.claim_next_job().await? else {
            return Ok(None);
        };
        info!("claimed job {} ({}, attempt {})", job.id, job.payload, job.attempts);

        let finished = match self.service.process_job(&job.payload).await {
            Ok(_) => db.complete_job(&job.id).await?,
            Err(e) => {
                error!("job {} failed: {e}", job.id);
                db.fail_job(&job.id, &e.to_string()).await?
            }
        };
        Ok(Some(finished))
    }

    /// Poll until `shutdown` resolves. Back-to-back jobs are processed
    /// without waiting; an empty queue waits one poll interval.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        if let Err(e) = self.reclaim_stale().await {
            error!("stale job scan failed: {e}");
        }
        loop {
            let delay = match self.run_once().await {
                Ok(Some(_)) => Duration::ZERO,
                Ok(None) => {
                    if let Err(e) = self.reclaim_stale().await {
                        error!("stale job scan failed: {e}");
                    }
                    self.poll_interval
                }
                Err(e) => {
                    error!("poll failed: {e}");
                    self.poll_interval
                }
            };
            tokio::select! {
                _ = &mut shutdown => {
                    info!("worker stopping");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use fileclip_core::{ClipConfig, JobPayload, JobStatus, Record};
    use fileclip_db::{Database, SqliteDatabase};

    use super::*;
    use crate::mock::StaticFetcher;
    use crate::{Capabilities, DbJobQueue, Dispatcher};

    const URL: &str = "https://www.filepicker.io/api/file/ibOold9OQfqbmzgP6D3O";

    fn queued_service(fetcher: Arc<StaticFetcher>) -> Arc<ClipService> {
        let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open_in_memory().unwrap());
        let caps = Capabilities::none().with_job_backend(Arc::new(DbJobQueue::new(db.clone())));
        let dispatcher = Dispatcher::builder(db.clone(), fetcher)
            .capabilities(Arc::new(caps))
            .clip("Image", ClipConfig::default())
            .build()
            .unwrap();
        Arc::new(ClipService::new(db, Arc::new(dispatcher)))
    }

    #[tokio::test]
    async fn run_once_completes_queued_job() {
        let fetcher = Arc::new(StaticFetcher::gif());
        let svc = queued_service(fetcher.clone());
        let worker = Worker::new(svc.clone(), Duration::from_millis(10));

        let mut image = Record::new("Image").with_reference(URL);
        svc.save(&mut image).await.unwrap();
        assert_eq!(fetcher.calls(), 0);

        let job = worker.run_once().await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(fetcher.calls(), 1);

        let stored = svc.get("Image", image.id.as_deref().unwrap()).await.unwrap();
        assert_eq!(stored.attachment.content_type.as_deref(), Some("image/gif"));

        // Processing writes the attachment without re-queueing.
        assert!(worker.run_once().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn run_once_records_failures() {
        let svc = queued_service(Arc::new(StaticFetcher::gif()));
        let worker = Worker::new(svc.clone(), Duration::from_millis(10));

        svc.database()
            .enqueue_job(&JobPayload {
                type_name: "Image".into(),
                id: None,
            })
            .await
            .unwrap();

        let job = worker.run_once().await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("no identifier"));
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let fetcher = Arc::new(StaticFetcher::gif());
        let svc = queued_service(fetcher.clone());
        let worker = Worker::new(svc.clone(), Duration::from_millis(10));

        let mut image = Record::new("Image").with_reference(URL);
        svc.save(&mut image).await.unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            worker
                .run(async {
                    let _ = rx.await;
                })
                .await;
        });

        for _ in 0..100 {
            if fetcher.calls() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(fetcher.calls(), 1);
        let jobs = svc.database().list_jobs(Some(JobStatus::Completed)).await.unwrap();
        assert_eq!(jobs.len(), 1);
    }

    #[tokio::test]
    async fn abandoned_jobs_are_requeued_then_failed() {
        let fetcher = Arc::new(StaticFetcher::gif());
        let svc = queued_service(fetcher.clone());
        let worker = Worker::new(svc.clone(), Duration::from_millis(10))
            .with_stale_after(Duration::ZERO)
            .with_max_attempts(2);

        let mut image = Record::new("Image").with_reference(URL);
        svc.save(&mut image).await.unwrap();
        let db = svc.database();

        // A worker claims the job and dies.
        let claimed = db.claim_next_job().await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(worker.reclaim_stale().await.unwrap(), 1);
        let job = db.get_job(&claimed.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        // Second claim is abandoned too and uses up the attempts.
        db.claim_next_job().await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(worker.reclaim_stale().await.unwrap(), 1);
        let job = db.get_job(&claimed.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("2 of 2 attempts"));

        assert_eq!(worker.reclaim_stale().await.unwrap(), 0);
        assert!(worker.run_once().await.unwrap().is_none());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn fresh_running_jobs_are_left_alone() {
        let svc = queued_service(Arc::new(StaticFetcher::gif()));
        let worker = Worker::new(svc.clone(), Duration::from_millis(10));

        let mut image = Record::new("Image").with_reference(URL);
        svc.save(&mut image).await.unwrap();
        let claimed = svc.database().claim_next_job().await.unwrap().unwrap();

        assert_eq!(worker.reclaim_stale().await.unwrap(), 0);
        let job = svc.database().get_job(&claimed.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Running);
    }
}

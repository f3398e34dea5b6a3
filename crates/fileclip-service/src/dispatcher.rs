//! Save-triggered processing of remote file references.
//!
//! Every completed save is run through [`Dispatcher::on_save`] exactly once.
//! The change detector decides whether the reference needs processing, and
//! the capability registry decides how:
//!
//! - a job backend is present: enqueue `{type_name, id}` and return
//! - a deferred-processing collaborator is present: do nothing, it owns the work
//! - otherwise: run [`Dispatcher::process`] before returning
//!
//! Overlapping saves of the same record are evaluated independently; nothing
//! here serializes them. A processing result is only written while the
//! stored reference still matches the one that was fetched.

use std::collections::HashMap;
use std::sync::Arc;

use fileclip_core::change::should_process;
use fileclip_core::strategy::select_strategy;
use fileclip_core::{Attachment, ClipConfig, ConfigError, JobPayload, Record, Strategy};
use fileclip_db::Database;
use tracing::{debug, info, warn};

use crate::capability::{Capabilities, CapabilityRegistry};
use crate::fetcher::MetadataFetcher;
use crate::storage::{AttachmentStorage, RemoteOnly};
use crate::ClipError;

pub struct Dispatcher {
    clips: HashMap<String, ClipConfig>,
    capabilities: Arc<dyn CapabilityRegistry>,
    fetcher: Arc<dyn MetadataFetcher>,
    storage: Arc<dyn AttachmentStorage>,
    db: Arc<dyn Database>,
}

impl Dispatcher {
    pub fn builder(db: Arc<dyn Database>, fetcher: Arc<dyn MetadataFetcher>) -> DispatcherBuilder {
        DispatcherBuilder {
            clips: HashMap::new(),
            capabilities: Arc::new(Capabilities::none()),
            fetcher,
            storage: Arc::new(RemoteOnly),
            db,
            error: None,
        }
    }

    pub fn config_for(&self, type_name: &str) -> Option<&ClipConfig> {
        self.clips.get(type_name)
    }

    /// The strategy a save of `record` would take, without acting on it.
    pub fn strategy_for(&self, record: &Record) -> Strategy {
        let triggered = self
            .clips
            .get(&record.type_name)
            .is_some_and(|config| should_process(record, config));
        select_strategy(
            triggered,
            self.capabilities.job_backend_enabled(),
            self.capabilities.deferred_enabled(),
        )
    }

    /// Handle one completed save.
    ///
    /// The inline path processes a copy and persists it; `record` itself is
    /// never modified.
    pub async fn on_save(&self, record: &Record) -> Result<Strategy, ClipError> {
        let strategy = self.strategy_for(record);
        match strategy {
            Strategy::Idle => {}
            Strategy::Enqueued => {
                let backend = self.capabilities.job_backend().ok_or_else(|| {
                    ClipError::Queue("job backend reported but not available".into())
                })?;
                let payload = JobPayload::for_record(record);
                backend.enqueue(&payload).await?;
                info!("{payload}: queued on {}", backend.name());
            }
            Strategy::Deferred => {
                debug!(
                    "{}: left to deferred processing",
                    JobPayload::for_record(record)
                );
            }
            Strategy::Inline => {
                let mut working = record.clone();
                self.process(&mut working).await?;
            }
        }
        Ok(strategy)
    }

    fn target<'a>(&'a self, record: &'a Record) -> Result<(&'a str, &'a str), ClipError> {
        let attachment_name = self
            .clips
            .get(&record.type_name)
            .map(|config| config.attachment_name.as_str())
            .ok_or_else(|| ConfigError::MissingAttachment(record.type_name.clone()))?;
        let reference = record
            .reference()
            .ok_or_else(|| ClipError::MissingReference(record.type_name.clone()))?;
        Ok((attachment_name, reference))
    }

    /// Fetch metadata for the record's reference and hand the file to the
    /// storage step. Nothing is written to the database.
    pub async fn prepare_attachment(&self, record: &Record) -> Result<Attachment, ClipError> {
        let (attachment_name, reference) = self.target(record)?;
        let metadata = self.fetcher.fetch(reference).await?;
        let store_key = self
            .storage
            .store(record, attachment_name, reference, &metadata)
            .await?;
        info!(
            "{}: fetched {} ({}, {} bytes)",
            JobPayload::for_record(record),
            metadata.file_name,
            metadata.content_type,
            metadata.size
        );
        Ok(metadata.to_attachment(reference, store_key))
    }

    /// Attach the file behind a saved record's reference.
    ///
    /// Only the attachment columns are written, and only if the stored
    /// reference is still the one that was fetched; otherwise
    /// [`ClipError::Stale`] is returned and the row is left to the newer
    /// save. Safe to run from a request or from a job; each call fetches
    /// again.
    pub async fn process(&self, record: &mut Record) -> Result<(), ClipError> {
        self.target(record)?;
        let id = record
            .id
            .clone()
            .ok_or_else(|| ClipError::MissingIdentifier(record.type_name.clone()))?;
        let attachment = self.prepare_attachment(record).await?;
        let previous_key = record.attachment.store_key.clone();

        let written = self
            .db
            .update_attachment(
                &record.type_name,
                &id,
                record.filepicker_url.as_deref(),
                &attachment,
            )
            .await;
        match written {
            Ok(Some(saved)) => {
                self.release_replaced(previous_key.as_deref(), &saved.attachment)
                    .await;
                *record = saved;
                Ok(())
            }
            Ok(None) => {
                self.release_unused(&attachment, previous_key.as_deref()).await;
                warn!(
                    "{}: reference changed during processing, result dropped",
                    JobPayload::for_record(record)
                );
                Err(ClipError::Stale(JobPayload::for_record(record).to_string()))
            }
            Err(e) => {
                self.release_unused(&attachment, previous_key.as_deref()).await;
                Err(e.into())
            }
        }
    }

    /// Discard the stored copy an attachment no longer points at.
    pub(crate) async fn release_replaced(&self, previous: Option<&str>, current: &Attachment) {
        if let Some(key) = previous {
            if current.store_key.as_deref() != Some(key) {
                self.discard(key).await;
            }
        }
    }

    /// Discard a freshly stored copy whose record write did not happen.
    pub(crate) async fn release_unused(&self, attachment: &Attachment, kept: Option<&str>) {
        if let Some(key) = attachment.store_key.as_deref() {
            if kept != Some(key) {
                self.discard(key).await;
            }
        }
    }

    async fn discard(&self, key: &str) {
        if let Err(e) = self.storage.discard(key).await {
            warn!("failed to discard {key}: {e}");
        }
    }
}

/// Collects per-type configuration; errors surface from [`DispatcherBuilder::build`].
pub struct DispatcherBuilder {
    clips: HashMap<String, ClipConfig>,
    capabilities: Arc<dyn CapabilityRegistry>,
    fetcher: Arc<dyn MetadataFetcher>,
    storage: Arc<dyn AttachmentStorage>,
    db: Arc<dyn Database>,
    error: Option<ConfigError>,
}

impl DispatcherBuilder {
    /// Attach remote references for records of `type_name`.
    pub fn clip(mut self, type_name: &str, config: ClipConfig) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Err(e) = config.validate(type_name) {
            self.error = Some(e);
        } else if self.clips.contains_key(type_name) {
            self.error = Some(ConfigError::DuplicateType(type_name.to_string()));
        } else {
            self.clips.insert(type_name.to_string(), config);
        }
        self
    }

    pub fn capabilities(mut self, capabilities: Arc<dyn CapabilityRegistry>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn AttachmentStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn build(self) -> Result<Dispatcher, ConfigError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Ok(Dispatcher {
            clips: self.clips,
            capabilities: self.capabilities,
            fetcher: self.fetcher,
            storage: self.storage,
            db: self.db,
        })
    }
}

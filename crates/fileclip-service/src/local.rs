use std::sync::Arc;

use fileclip_core::{JobPayload, Record, Strategy};
use fileclip_db::{Database, DbError};

use crate::{ClipError, Dispatcher};

/// The save pipeline: persists records and runs the dispatcher once per save.
pub struct ClipService {
    db: Arc<dyn Database>,
    dispatcher: Arc<Dispatcher>,
}

impl ClipService {
    pub fn new(db: Arc<dyn Database>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { db, dispatcher }
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn get(&self, type_name: &str, id: &str) -> Result<Record, ClipError> {
        Ok(self.db.get_record(type_name, id).await?)
    }

    /// Save `record` and run the save hook.
    ///
    /// When the save would be processed inline, the file is fetched first and
    /// the reference is written together with its attachment, so no reader
    /// sees a new reference next to the old attachment. Otherwise the row is
    /// written and then handed to the hook. If anything fails the stored row
    /// is left (or put back) the way it was and `record` is unchanged.
    pub async fn save(&self, record: &mut Record) -> Result<Strategy, ClipError> {
        let snapshot = match &record.id {
            Some(id) => match self.db.get_record(&record.type_name, id).await {
                Ok(stored) => Some(stored),
                Err(DbError::NotFound(_)) => None,
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        let mut pending = record.clone();
        pending.previous_changes = record.diff(snapshot.as_ref());
        if self.dispatcher.strategy_for(&pending) == Strategy::Inline {
            *record = self.save_inline(pending, snapshot.as_ref()).await?;
            return Ok(Strategy::Inline);
        }

        let saved = self.db.save_record(record).await?;
        match self.dispatcher.on_save(&saved).await {
            Ok(Strategy::Inline) => {
                // Capabilities changed since the check above; the hook has
                // already written the processed row.
                let id = saved.id.as_deref().unwrap_or_default();
                *record = self.get(&saved.type_name, id).await?;
                Ok(Strategy::Inline)
            }
            Ok(strategy) => {
                *record = saved;
                Ok(strategy)
            }
            Err(e) => {
                self.roll_back(&saved, snapshot.as_ref()).await;
                Err(e)
            }
        }
    }

    async fn save_inline(
        &self,
        mut pending: Record,
        snapshot: Option<&Record>,
    ) -> Result<Record, ClipError> {
        if pending.id.is_none() {
            pending.id = Some(uuid::Uuid::new_v4().to_string());
        }
        let attachment = self.dispatcher.prepare_attachment(&pending).await?;
        let previous_key = snapshot.and_then(|s| s.attachment.store_key.as_deref());
        pending.attachment = attachment.clone();

        match self.db.save_record(&pending).await {
            Ok(saved) => {
                self.dispatcher
                    .release_replaced(previous_key, &saved.attachment)
                    .await;
                tracing::info!("{}: attached inline", JobPayload::for_record(&saved));
                Ok(saved)
            }
            Err(e) => {
                self.dispatcher.release_unused(&attachment, previous_key).await;
                Err(e.into())
            }
        }
    }

    async fn roll_back(&self, saved: &Record, snapshot: Option<&Record>) {
        let result = match (snapshot, saved.id.as_deref()) {
            (Some(snapshot), _) => self.db.restore_record(snapshot).await,
            (None, Some(id)) => self.db.delete_record(&saved.type_name, id).await,
            (None, None) => Ok(()),
        };
        match result {
            Ok(()) => tracing::warn!("{}: save rolled back", JobPayload::for_record(saved)),
            Err(e) => tracing::error!(
                "{}: rollback failed: {e}",
                JobPayload::for_record(saved)
            ),
        }
    }

    /// Job consumer entry point: reload the record and process it.
    pub async fn process_job(&self, payload: &JobPayload) -> Result<Record, ClipError> {
        let id = payload
            .id
            .as_deref()
            .ok_or_else(|| ClipError::MissingIdentifier(payload.type_name.clone()))?;
        let mut record = self.get(&payload.type_name, id).await?;
        self.dispatcher.process(&mut record).await?;
        Ok(record)
    }
}

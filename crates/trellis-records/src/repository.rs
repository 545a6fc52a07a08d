use std::sync::Arc;

use tracing::{debug, info};
use trellis_assets::{AssetUploader, HttpAssetUploader};
use trellis_collections::{CategoryCollection, DualProjectionWriter, Intent, IntentLog, PartialWrite};
use trellis_store::{InMemoryPathStore, JsonFileStore, PathStore};
use trellis_types::RecordId;

use crate::category::CategoryMutator;
use crate::config::{CollectionsConfig, StoreBackend, TrellisConfig};
use crate::entity::{EntitySpec, LECTURE, NOTIFICATION, SPONSOR, USER};
use crate::error::{RecordError, RecordResult};
use crate::events::EventMutator;
use crate::roster::RosterMutator;

/// Entry point: one store, one uploader, a mutator per entity type.
pub struct Trellis {
    store: Arc<dyn PathStore>,
    intents: IntentLog,
    sponsors: CategoryMutator,
    lectures: CategoryMutator,
    notifications: CategoryMutator,
    users: CategoryMutator,
    events: EventMutator,
    roster: RosterMutator,
}

impl Trellis {
    /// Build from explicit collaborators.
    pub fn new(
        store: Arc<dyn PathStore>,
        uploader: Arc<dyn AssetUploader>,
        collections: &CollectionsConfig,
    ) -> RecordResult<Self> {
        let intents = IntentLog::with_root(store.clone(), CollectionsConfig::root(&collections.intents)?);
        let journal = collections.intent_log.then(|| intents.clone());

        let category = |spec: &'static EntitySpec, root: &str| -> RecordResult<CategoryMutator> {
            let mut records = CategoryCollection::new(store.clone(), CollectionsConfig::root(root)?);
            if let Some(log) = &journal {
                records = records.with_intent_log(log.clone());
            }
            Ok(CategoryMutator::new(spec, records, uploader.clone()))
        };
        let sponsors = category(&SPONSOR, &collections.sponsors)?;
        let lectures = category(&LECTURE, &collections.lectures)?;
        let notifications = category(&NOTIFICATION, &collections.notifications)?;
        let users = category(&USER, &collections.users)?;

        let mut writer = DualProjectionWriter::new(
            store.clone(),
            CollectionsConfig::root(&collections.events)?,
            CollectionsConfig::root(&collections.event_details)?,
        );
        if let Some(log) = &journal {
            writer = writer.with_intent_log(log.clone());
        }
        let events = EventMutator::new(writer, uploader.clone());
        let roster = RosterMutator::new(store.clone(), CollectionsConfig::root(&collections.teams)?, uploader);

        debug!(intent_log = collections.intent_log, "trellis assembled");
        Ok(Self {
            store,
            intents,
            sponsors,
            lectures,
            notifications,
            users,
            events,
            roster,
        })
    }

    /// Build the configured store and HTTP uploader.
    pub fn open(config: &TrellisConfig) -> RecordResult<Self> {
        let uploader = HttpAssetUploader::new(config.uploader.clone())
            .map_err(|e| RecordError::Config(e.to_string()))?;
        Self::with_uploader(config, Arc::new(uploader))
    }

    /// Build the configured store with a caller-supplied uploader.
    pub fn with_uploader(config: &TrellisConfig, uploader: Arc<dyn AssetUploader>) -> RecordResult<Self> {
        let store: Arc<dyn PathStore> = match config.store.backend {
            StoreBackend::Memory => Arc::new(InMemoryPathStore::new()),
            StoreBackend::File => Arc::new(JsonFileStore::new(config.store.file_config())),
        };
        info!(backend = ?config.store.backend, path = %config.store.path.display(), "store opened");
        Self::new(store, uploader, &config.collections)
    }

    pub fn store(&self) -> &Arc<dyn PathStore> {
        &self.store
    }

    pub fn sponsors(&self) -> &CategoryMutator {
        &self.sponsors
    }

    pub fn lectures(&self) -> &CategoryMutator {
        &self.lectures
    }

    pub fn notifications(&self) -> &CategoryMutator {
        &self.notifications
    }

    pub fn users(&self) -> &CategoryMutator {
        &self.users
    }

    pub fn events(&self) -> &EventMutator {
        &self.events
    }

    pub fn roster(&self) -> &RosterMutator {
        &self.roster
    }

    /// The intent journal. Readable even when journaling of new writes is
    /// switched off, so entries from earlier runs stay visible.
    pub fn intents(&self) -> &IntentLog {
        &self.intents
    }

    pub async fn pending_intents(&self) -> RecordResult<Vec<Intent>> {
        Ok(self.intents.pending().await?)
    }

    /// Finish a journaled operation and drop its entry.
    pub async fn replay_intent(&self, id: &RecordId) -> RecordResult<Intent> {
        let intent = self.intents.replay(id).await?;
        info!(intent = %id, kind = %intent.kind, "intent replayed");
        Ok(intent)
    }

    /// Drop a journal entry that was repaired by other means.
    pub async fn discard_intent(&self, id: &RecordId) -> RecordResult<()> {
        self.intents.resolve(id).await?;
        info!(intent = %id, "intent discarded");
        Ok(())
    }

    /// Re-run the failed half of any partial write.
    pub async fn repair(&self, partial: &PartialWrite) -> RecordResult<()> {
        partial.retry_failed_step(self.store.as_ref()).await?;
        if let Some(id) = &partial.intent {
            self.intents.resolve(id).await?;
        }
        info!(kind = %partial.kind, path = %partial.failed.path, "partial write repaired");
        Ok(())
    }
}

impl std::fmt::Debug for Trellis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trellis")
            .field("sponsors", &self.sponsors)
            .field("events", &self.events)
            .field("roster", &self.roster)
            .field("intents", &self.intents)
            .finish()
    }
}

//! One logical entity stored as two category-keyed projections.
//!
//! The summary projection feeds listings and timelines; the detail
//! projection holds the full description. Both live at the same
//! `category/id` under different roots. Writes go summary first, then
//! detail, with no rollback and no read-back: success means both store
//! calls returned without error.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};
use trellis_store::PathStore;
use trellis_types::{DocPath, Node, Record, RecordId, WriteMode};

use crate::category::{CategoryCollection, CategoryMap};
use crate::error::{CollectionError, CollectionResult};
use crate::intent::IntentLog;
use crate::partial::{PartialWrite, Step, StepRole, TwoStepKind};

/// Identity shared by both projections.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectionKey {
    pub category: String,
    pub id: RecordId,
}

impl ProjectionKey {
    pub fn new(category: impl Into<String>, id: RecordId) -> Self {
        Self {
            category: category.into(),
            id,
        }
    }
}

impl fmt::Display for ProjectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.id)
    }
}

/// Both projections of one entity as read from the store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Projections {
    pub summary: Option<Record>,
    pub detail: Option<Record>,
}

impl Projections {
    /// Returns `true` when exactly one side exists.
    pub fn is_split(&self) -> bool {
        self.summary.is_some() != self.detail.is_some()
    }
}

/// Writes one entity to a summary and a detail collection.
#[derive(Clone)]
pub struct DualProjectionWriter {
    store: Arc<dyn PathStore>,
    summary: CategoryCollection,
    detail: CategoryCollection,
    intents: Option<IntentLog>,
}

impl DualProjectionWriter {
    pub fn new(store: Arc<dyn PathStore>, summary_root: DocPath, detail_root: DocPath) -> Self {
        Self {
            summary: CategoryCollection::new(store.clone(), summary_root),
            detail: CategoryCollection::new(store.clone(), detail_root),
            store,
            intents: None,
        }
    }

    /// Record each two-step write in `log` while it is in flight.
    pub fn with_intent_log(mut self, log: IntentLog) -> Self {
        self.intents = Some(log);
        self
    }

    pub fn summary(&self) -> &CategoryCollection {
        &self.summary
    }

    pub fn detail(&self) -> &CategoryCollection {
        &self.detail
    }

    /// Write the summary patch, then the detail patch.
    ///
    /// A summary failure returns the store error with nothing written. A
    /// detail failure returns [`PartialWrite`] with the summary in place and
    /// the detail patch attached for repair.
    pub async fn write_both(
        &self,
        key: &ProjectionKey,
        summary_patch: Record,
        detail_patch: Record,
        mode: WriteMode,
    ) -> CollectionResult<()> {
        let first = Step::write(
            StepRole::Summary,
            self.summary.record_path(&key.category, &key.id)?,
            Node::Object(summary_patch),
            mode,
        );
        let second = Step::write(
            StepRole::Detail,
            self.detail.record_path(&key.category, &key.id)?,
            Node::Object(detail_patch),
            mode,
        );
        self.run_pair(TwoStepKind::WriteBoth, key, first, second).await?;
        debug!(%key, %mode, "both projections written");
        Ok(())
    }

    /// Delete the summary, then the detail. Same failure policy as
    /// [`write_both`](Self::write_both).
    pub async fn delete_both(&self, key: &ProjectionKey) -> CollectionResult<()> {
        let first = Step::delete(StepRole::Summary, self.summary.record_path(&key.category, &key.id)?);
        let second = Step::delete(StepRole::Detail, self.detail.record_path(&key.category, &key.id)?);
        self.run_pair(TwoStepKind::DeleteBoth, key, first, second).await?;
        debug!(%key, "both projections deleted");
        Ok(())
    }

    /// Re-run the half of a two-step write that failed, and clear its
    /// intent entry when one was kept.
    pub async fn repair(&self, partial: &PartialWrite) -> CollectionResult<()> {
        partial.retry_failed_step(self.store.as_ref()).await?;
        if let (Some(log), Some(id)) = (&self.intents, &partial.intent) {
            log.resolve(id).await?;
        }
        debug!(path = %partial.failed.path, "partial write repaired");
        Ok(())
    }

    pub async fn read_both(&self, key: &ProjectionKey) -> CollectionResult<Projections> {
        Ok(Projections {
            summary: optional(self.summary.get(&key.category, &key.id).await)?,
            detail: optional(self.detail.get(&key.category, &key.id).await)?,
        })
    }

    pub async fn list_summaries(&self) -> CollectionResult<CategoryMap> {
        self.summary.list_all().await
    }

    async fn run_pair(
        &self,
        kind: TwoStepKind,
        key: &ProjectionKey,
        first: Step,
        second: Step,
    ) -> CollectionResult<()> {
        let intent = match &self.intents {
            Some(log) => Some(log.begin(kind, &first, &second).await?),
            None => None,
        };

        if let Err(e) = first.run(self.store.as_ref()).await {
            if let (Some(log), Some(id)) = (&self.intents, &intent) {
                log.complete(id).await;
            }
            return Err(e.into());
        }

        if let Err(cause) = second.run(self.store.as_ref()).await {
            warn!(
                %key,
                %kind,
                intent = ?intent,
                error = %cause,
                "summary projection landed but detail projection did not"
            );
            return Err(PartialWrite {
                kind,
                completed: first,
                failed: second,
                intent,
                cause,
            }
            .into());
        }

        if let (Some(log), Some(id)) = (&self.intents, &intent) {
            log.complete(id).await;
        }
        Ok(())
    }
}

fn optional(result: CollectionResult<Record>) -> CollectionResult<Option<Record>> {
    match result {
        Ok(record) => Ok(Some(record)),
        Err(CollectionError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

impl fmt::Debug for DualProjectionWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DualProjectionWriter")
            .field("summary", self.summary.root())
            .field("detail", self.detail.root())
            .field("intents", &self.intents.is_some())
            .finish()
    }
}

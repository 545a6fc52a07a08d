//! A two-level `category → id → record` collection.
//!
//! Ids are unique within a category only: `gold/acme` and `silver/acme` are
//! independent records. `create` overwrites unconditionally; callers that
//! need duplicate protection check [`exists`](CategoryCollection::exists)
//! first.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};
use trellis_store::PathStore;
use trellis_types::{DocPath, Node, Record, RecordId, WriteMode};

use crate::error::{CollectionError, CollectionResult};
use crate::intent::IntentLog;
use crate::partial::{PartialWrite, Step, StepRole, TwoStepKind};

/// Records grouped by category, then by id.
pub type CategoryMap = BTreeMap<String, BTreeMap<String, Record>>;

/// Category-keyed view over the mapping at `root`.
#[derive(Clone)]
pub struct CategoryCollection {
    store: Arc<dyn PathStore>,
    root: DocPath,
    intents: Option<IntentLog>,
}

impl CategoryCollection {
    pub fn new(store: Arc<dyn PathStore>, root: DocPath) -> Self {
        Self {
            store,
            root,
            intents: None,
        }
    }

    /// Record category moves in `log` while they are in flight.
    pub fn with_intent_log(mut self, log: IntentLog) -> Self {
        self.intents = Some(log);
        self
    }

    pub fn root(&self) -> &DocPath {
        &self.root
    }

    pub fn category_path(&self, category: &str) -> CollectionResult<DocPath> {
        Ok(self.root.child(category)?)
    }

    pub fn record_path(&self, category: &str, id: &RecordId) -> CollectionResult<DocPath> {
        Ok(self.root.child(category)?.child(id.as_str())?)
    }

    /// Every record in every category. An absent root is an empty map.
    pub async fn list_all(&self) -> CollectionResult<CategoryMap> {
        let Some(node) = self.store.read(&self.root).await? else {
            return Ok(CategoryMap::new());
        };
        let Node::Object(categories) = node else {
            return Err(CollectionError::malformed(&self.root, "collection root is not a mapping"));
        };
        categories
            .into_iter()
            .map(|(category, node)| {
                let path = self.root.child(category.as_str())?;
                Ok((category, records_of(&path, node)?))
            })
            .collect()
    }

    /// Every record in one category.
    pub async fn list_category(&self, category: &str) -> CollectionResult<BTreeMap<String, Record>> {
        let path = self.category_path(category)?;
        match self.store.read(&path).await? {
            Some(node) => records_of(&path, node),
            None => Ok(BTreeMap::new()),
        }
    }

    pub async fn get(&self, category: &str, id: &RecordId) -> CollectionResult<Record> {
        let path = self.record_path(category, id)?;
        match self.store.read(&path).await? {
            Some(Node::Object(record)) => Ok(record),
            Some(_) => Err(CollectionError::malformed(&path, "record is not a mapping")),
            None => Err(CollectionError::not_found(path)),
        }
    }

    pub async fn exists(&self, category: &str, id: &RecordId) -> CollectionResult<bool> {
        Ok(self.store.exists(&self.record_path(category, id)?).await?)
    }

    /// Write `record` at `category/id`, replacing anything already there.
    pub async fn create(&self, category: &str, id: &RecordId, record: Record) -> CollectionResult<()> {
        let path = self.record_path(category, id)?;
        self.store.write(&path, Node::Object(record), WriteMode::Replace).await?;
        debug!(%path, "record written");
        Ok(())
    }

    /// Merge `patch` into the record at `category/id`.
    pub async fn update(&self, category: &str, id: &RecordId, patch: Record) -> CollectionResult<()> {
        let path = self.record_path(category, id)?;
        self.store.write(&path, Node::Object(patch), WriteMode::Merge).await?;
        debug!(%path, "record merged");
        Ok(())
    }

    /// Remove `category/id`. Removing an absent record succeeds.
    pub async fn delete(&self, category: &str, id: &RecordId) -> CollectionResult<()> {
        let path = self.record_path(category, id)?;
        self.store.delete(&path).await?;
        debug!(%path, "record deleted");
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

    /// Move `id` from `old_category` to `new_category`, storing `record`.
    ///
    /// Deletes from the old category first, then creates in the new one. If
    /// the create fails the record exists in neither category; the returned
    /// [`PartialWrite`] carries the record so the create can be re-run.
    pub async fn move_category(
        &self,
        old_category: &str,
        new_category: &str,
        id: &RecordId,
        record: Record,
    ) -> CollectionResult<()> {
        let first = Step::delete(StepRole::RemoveFromOld, self.record_path(old_category, id)?);
        let second = Step::write(
            StepRole::WriteToNew,
            self.record_path(new_category, id)?,
            Node::Object(record),
            WriteMode::Replace,
        );

        let intent = match &self.intents {
            Some(log) => Some(log.begin(TwoStepKind::MoveCategory, &first, &second).await?),
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
                from = %first.path,
                to = %second.path,
                intent = ?intent,
                error = %cause,
                "category move stopped after delete; record is in neither category"
            );
            return Err(PartialWrite {
                kind: TwoStepKind::MoveCategory,
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
        debug!(from = %first.path, to = %second.path, "record moved");
        Ok(())
    }
}

fn records_of(path: &DocPath, node: Node) -> CollectionResult<BTreeMap<String, Record>> {
    let Node::Object(entries) = node else {
        return Err(CollectionError::malformed(path, "category is not a mapping"));
    };
    entries
        .into_iter()
        .map(|(id, node)| match node {
            Node::Object(record) => Ok((id, record)),
            _ => Err(CollectionError::malformed(
                &path.child(id.as_str()).unwrap_or_else(|_| path.clone()),
                "record is not a mapping",
            )),
        })
        .collect()
}

impl std::fmt::Debug for CategoryCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryCollection")
            .field("root", &self.root)
            .field("intents", &self.intents.is_some())
            .finish()
    }
}

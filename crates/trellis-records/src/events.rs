//! Events: one logical record stored as a summary and a detail projection.
//!
//! Identity and timestamp fields are written to both sides; the rest are
//! routed by [`split_event`]. The category is part of the key on both
//! sides and cannot be changed by an update.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;
use trellis_assets::AssetUploader;
use trellis_collections::{CategoryMap, DualProjectionWriter, PartialWrite, Projections};
use trellis_types::{Record, RecordId, WriteMode};

use crate::asset::resolve_asset;
use crate::entity::{split_event, Change, EVENT};
use crate::error::{RecordError, RecordResult};
use crate::EntityKey;

#[derive(Clone)]
pub struct EventMutator {
    writer: DualProjectionWriter,
    uploader: Arc<dyn AssetUploader>,
}

impl EventMutator {
    pub fn new(writer: DualProjectionWriter, uploader: Arc<dyn AssetUploader>) -> Self {
        Self { writer, uploader }
    }

    pub fn writer(&self) -> &DualProjectionWriter {
        &self.writer
    }

    /// Summaries of every event, by category.
    pub async fn list(&self) -> RecordResult<CategoryMap> {
        Ok(self.writer.list_summaries().await?)
    }

    pub async fn list_category(&self, category: &str) -> RecordResult<BTreeMap<String, Record>> {
        Ok(self.writer.summary().list_category(category).await?)
    }

    /// Both projections. `NotFound` only when neither side exists; a split
    /// event is returned as is.
    pub async fn get(&self, key: &EntityKey) -> RecordResult<Projections> {
        let projections = self.writer.read_both(key).await?;
        if projections.summary.is_none() && projections.detail.is_none() {
            return Err(RecordError::NotFound(format!("event {key}")));
        }
        Ok(projections)
    }

    pub async fn create(&self, mut change: Change) -> RecordResult<EntityKey> {
        EVENT.validate_new(&change.fields)?;
        let key = EntityKey::new(EVENT.category_of(&change.fields)?, RecordId::generate());
        self.writer.summary().record_path(&key.category, &key.id)?;

        resolve_asset(self.uploader.as_ref(), &EVENT, &mut change).await?;
        let (summary, detail) = split_event(&change.fields);
        self.writer.write_both(&key, summary, detail, WriteMode::Replace).await?;
        info!(%key, "event created");
        Ok(key)
    }

    /// Merge `change` into the projections its fields belong to.
    ///
    /// A split event is refused with [`RecordError::SplitProjection`]; the
    /// missing side has to be restored first. A side whose patch is empty is
    /// not written.
    pub async fn update(&self, key: &EntityKey, mut change: Change) -> RecordResult<()> {
        EVENT.validate_patch(&change)?;
        if let Some(category) = change.text(EVENT.category_field) {
            if category != key.category {
                return Err(RecordError::invalid(format!(
                    "event {key}: category cannot change from {} to {category}; delete and recreate",
                    key.category
                )));
            }
        }
        if self.get(key).await?.is_split() {
            return Err(RecordError::SplitProjection(format!("event {key}")));
        }

        resolve_asset(self.uploader.as_ref(), &EVENT, &mut change).await?;
        let (summary, detail) = split_event(&change.fields);
        match (summary.is_empty(), detail.is_empty()) {
            (true, true) => return Ok(()),
            (false, true) => self.writer.summary().update(&key.category, &key.id, summary).await?,
            (true, false) => self.writer.detail().update(&key.category, &key.id, detail).await?,
            (false, false) => {
                self.writer
                    .write_both(key, summary, detail, WriteMode::Merge)
                    .await?
            }
        }
        info!(%key, "event updated");
        Ok(())
    }

    /// Remove both projections. Removing an absent event succeeds.
    pub async fn delete(&self, key: &EntityKey) -> RecordResult<()> {
        self.writer.delete_both(key).await?;
        info!(%key, "event deleted");
        Ok(())
    }

    /// Re-run the projection write or delete that failed.
    pub async fn repair(&self, partial: &PartialWrite) -> RecordResult<()> {
        self.writer.repair(partial).await?;
        info!(path = %partial.failed.path, "event projection repaired");
        Ok(())
    }
}

impl std::fmt::Debug for EventMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventMutator").field("writer", &self.writer).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_assets::StubUploader;
    use trellis_store::{Fault, InMemoryPathStore, InstrumentedStore, PathStore};
    use trellis_types::{AssetPayload, DocPath, Node};

    fn p(s: &str) -> DocPath {
        DocPath::parse(s).unwrap()
    }

    fn change(v: Node) -> Change {
        Change::from_node(v).unwrap()
    }

    fn events(store: Arc<dyn PathStore>, uploader: Arc<StubUploader>) -> EventMutator {
        EventMutator::new(DualProjectionWriter::new(store, p("events"), p("eventDetails")), uploader)
    }

    fn hackathon() -> Node {
        json!({
            "name": "Hackathon",
            "category": "tech",
            "startTime": "2026-03-01T09:00:00Z",
            "endTime": "2026-03-02T09:00:00Z",
            "venue": "Hall A",
            "description": "24h build",
            "contact": "ops@example.test"
        })
    }

    #[tokio::test]
    async fn create_writes_both_projections_with_poster() {
        let store = Arc::new(InstrumentedStore::new(InMemoryPathStore::new()));
        let ev = events(store.clone(), Arc::new(StubUploader::new("https://cdn.test")));
        let key = ev
            .create(change(hackathon()).with_asset(AssetPayload::from(b"poster".to_vec())))
            .await
            .unwrap();

        assert_eq!(key.category, "tech");
        let both = ev.get(&key).await.unwrap();
        let summary = both.summary.unwrap();
        let detail = both.detail.unwrap();
        assert_eq!(summary["venue"], "Hall A");
        assert!(!summary.contains_key("description"));
        assert_eq!(detail["description"], "24h build");
        for field in ["name", "startTime", "endTime", "poster", "posterThumb"] {
            assert_eq!(summary[field], detail[field], "{field} differs");
        }
        assert_eq!(store.writes().len(), 2);
    }

    #[tokio::test]
    async fn failed_upload_writes_neither_projection() {
        let store = Arc::new(InstrumentedStore::new(InMemoryPathStore::new()));
        let ev = events(store.clone(), Arc::new(StubUploader::failing()));
        let err = ev
            .create(change(hackathon()).with_asset(AssetPayload::from(b"poster".to_vec())))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::AssetUploadFailed(_)));
        assert_eq!(store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn detail_failure_is_partial_and_summary_stays() {
        let store = Arc::new(InstrumentedStore::new(InMemoryPathStore::new()));
        let ev = events(store.clone(), Arc::new(StubUploader::default()));
        store.inject(Fault::on_writes().under(p("eventDetails")).times(1));

        let err = ev.create(change(hackathon())).await.unwrap_err();
        let partial = err.as_partial_write().expect("partial write");
        assert!(partial.summary_succeeded());
        assert!(!partial.detail_succeeded());

        let summaries = ev.list().await.unwrap();
        assert_eq!(summaries["tech"].len(), 1);

        ev.repair(partial).await.unwrap();
        let (id, _) = summaries["tech"].iter().next().unwrap();
        let key = EntityKey::new("tech", RecordId::new(id.as_str()).unwrap());
        assert!(!ev.get(&key).await.unwrap().is_split());
    }

    #[tokio::test]
    async fn update_patches_shared_fields_on_both_sides() {
        let ev = events(Arc::new(InMemoryPathStore::new()), Arc::new(StubUploader::default()));
        let key = ev.create(change(hackathon())).await.unwrap();
        ev.update(&key, change(json!({"startTime": "2026-03-01T10:00:00Z", "rules": "No AI"})))
            .await
            .unwrap();

        let both = ev.get(&key).await.unwrap();
        let (summary, detail) = (both.summary.unwrap(), both.detail.unwrap());
        assert_eq!(summary["startTime"], "2026-03-01T10:00:00Z");
        assert_eq!(detail["startTime"], "2026-03-01T10:00:00Z");
        assert_eq!(detail["rules"], "No AI");
        assert_eq!(detail["description"], "24h build");
        assert!(!summary.contains_key("rules"));
    }

    #[tokio::test]
    async fn split_event_refuses_updates_until_repaired() {
        let store = Arc::new(InstrumentedStore::new(InMemoryPathStore::new()));
        let ev = events(store.clone(), Arc::new(StubUploader::default()));
        store.inject(Fault::on_writes().under(p("eventDetails")).times(1));
        let err = ev.create(change(hackathon())).await.unwrap_err();
        let partial = err.as_partial_write().expect("partial write");
        let summaries = ev.list().await.unwrap();
        let (id, _) = summaries["tech"].iter().next().unwrap();
        let key = EntityKey::new("tech", RecordId::new(id.as_str()).unwrap());
        store.clear_journal();

        let refused = ev.update(&key, change(json!({"venue": "Hall B"}))).await.unwrap_err();
        assert!(matches!(refused, RecordError::SplitProjection(_)));
        assert_eq!(store.mutation_count(), 0);
        let both = ev.get(&key).await.unwrap();
        assert!(both.is_split());
        assert!(both.detail.is_none());

        ev.repair(partial).await.unwrap();
        ev.update(&key, change(json!({"venue": "Hall B"}))).await.unwrap();
        let both = ev.get(&key).await.unwrap();
        assert_eq!(both.summary.unwrap()["venue"], "Hall B");
        assert_eq!(both.detail.unwrap()["description"], "24h build");
    }

    #[tokio::test]
    async fn update_writes_only_the_sides_it_touches() {
        let store = Arc::new(InstrumentedStore::new(InMemoryPathStore::new()));
        let ev = events(store.clone(), Arc::new(StubUploader::default()));
        let key = ev.create(change(hackathon())).await.unwrap();
        store.clear_journal();

        ev.update(&key, change(json!({"venue": "Hall B"}))).await.unwrap();
        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].starts_with(&p("events")));

        store.clear_journal();
        ev.update(&key, change(json!({"description": "36h build"}))).await.unwrap();
        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].starts_with(&p("eventDetails")));
        assert_eq!(ev.get(&key).await.unwrap().detail.unwrap()["description"], "36h build");
    }

    #[tokio::test]
    async fn category_change_is_rejected() {
        let store = Arc::new(InstrumentedStore::new(InMemoryPathStore::new()));
        let ev = events(store.clone(), Arc::new(StubUploader::default()));
        let key = ev.create(change(hackathon())).await.unwrap();
        store.clear_journal();

        let err = ev.update(&key, change(json!({"category": "cultural"}))).await.unwrap_err();
        assert!(matches!(err, RecordError::InvalidRecord(_)));
        assert!(store.journal().is_empty());
        // Restating the same category is fine.
        ev.update(&key, change(json!({"category": "tech"}))).await.unwrap();
    }

    #[tokio::test]
    async fn missing_event_is_not_found_and_delete_is_idempotent() {
        let ev = events(Arc::new(InMemoryPathStore::new()), Arc::new(StubUploader::default()));
        let ghost = EntityKey::new("tech", RecordId::generate());
        assert!(ev.get(&ghost).await.unwrap_err().is_not_found());
        assert!(ev.update(&ghost, change(json!({"venue": "x"}))).await.unwrap_err().is_not_found());

        let key = ev.create(change(hackathon())).await.unwrap();
        ev.delete(&key).await.unwrap();
        ev.delete(&key).await.unwrap();
        assert!(ev.list().await.unwrap().is_empty());
    }
}

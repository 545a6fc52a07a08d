//! Mutators for the single-collection, category-keyed entities: sponsors,
//! lectures, notifications and users.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use trellis_assets::AssetUploader;
use trellis_collections::{CategoryCollection, CategoryMap, PartialWrite};
use trellis_store::tree;
use trellis_types::{Node, Record};

use crate::asset::resolve_asset;
use crate::entity::{Change, EntitySpec, CREATED_AT};
use crate::error::{RecordError, RecordResult};
use crate::EntityKey;

/// Create, update and delete one category-keyed entity type.
#[derive(Clone)]
pub struct CategoryMutator {
    spec: &'static EntitySpec,
    records: CategoryCollection,
    uploader: Arc<dyn AssetUploader>,
}

impl CategoryMutator {
    pub fn new(spec: &'static EntitySpec, records: CategoryCollection, uploader: Arc<dyn AssetUploader>) -> Self {
        Self {
            spec,
            records,
            uploader,
        }
    }

    pub fn spec(&self) -> &'static EntitySpec {
        self.spec
    }

    pub fn collection(&self) -> &CategoryCollection {
        &self.records
    }

    pub async fn list(&self) -> RecordResult<CategoryMap> {
        Ok(self.records.list_all().await?)
    }

    pub async fn list_category(&self, category: &str) -> RecordResult<BTreeMap<String, Record>> {
        Ok(self.records.list_category(category).await?)
    }

    pub async fn get(&self, key: &EntityKey) -> RecordResult<Record> {
        Ok(self.records.get(&key.category, &key.id).await?)
    }

    /// Validate, upload the asset, then write the record.
    ///
    /// Returns the key the record was stored under.
    pub async fn create(&self, mut change: Change) -> RecordResult<EntityKey> {
        self.spec.validate_new(&change.fields)?;
        let key = EntityKey::new(
            self.spec.category_of(&change.fields)?,
            self.spec.new_id(&change.fields)?,
        );
        self.records.record_path(&key.category, &key.id)?;
        if self.spec.unique && self.records.exists(&key.category, &key.id).await? {
            return Err(RecordError::AlreadyExists(format!("{} {key}", self.spec.name)));
        }

        resolve_asset(self.uploader.as_ref(), self.spec, &mut change).await?;
        if self.spec.stamp_created {
            change
                .fields
                .insert(CREATED_AT.to_string(), Node::String(Utc::now().to_rfc3339()));
        }
        self.records.create(&key.category, &key.id, change.fields).await?;
        info!(entity = self.spec.name, %key, "record created");
        Ok(key)
    }

    /// Merge `change` into an existing record.
    ///
    /// When the change carries a different category the merged record is
    /// moved with [`CategoryCollection::move_category`] and the new key is
    /// returned. A failed move surfaces as [`RecordError::PartialWrite`].
    pub async fn update(&self, key: &EntityKey, mut change: Change) -> RecordResult<EntityKey> {
        self.spec.validate_patch(&change)?;
        let current = self.records.get(&key.category, &key.id).await?;
        let target = change
            .text(self.spec.category_field)
            .filter(|category| *category != key.category)
            .map(str::to_string);
        if let Some(category) = &target {
            self.records.record_path(category, &key.id)?;
            if self.spec.unique && self.records.exists(category, &key.id).await? {
                return Err(RecordError::AlreadyExists(format!("{} {category}/{}", self.spec.name, key.id)));
            }
        }

        resolve_asset(self.uploader.as_ref(), self.spec, &mut change).await?;
        let Some(category) = target else {
            self.records.update(&key.category, &key.id, change.fields).await?;
            info!(entity = self.spec.name, %key, "record updated");
            return Ok(key.clone());
        };

        let mut merged = Node::Object(current);
        tree::merge_node(&mut merged, Node::Object(change.fields));
        let Node::Object(record) = merged else {
            return Err(RecordError::invalid(format!("{}: merged record is not a mapping", self.spec.name)));
        };
        let moved = EntityKey::new(category, key.id.clone());
        self.records
            .move_category(&key.category, &moved.category, &key.id, record)
            .await?;
        info!(entity = self.spec.name, from = %key, to = %moved, "record moved");
        Ok(moved)
    }

    /// Remove a record. Removing an absent record succeeds.
    pub async fn delete(&self, key: &EntityKey) -> RecordResult<()> {
        self.records.delete(&key.category, &key.id).await?;
        info!(entity = self.spec.name, %key, "record deleted");
        Ok(())
    }

    /// Finish a category move that stopped after its delete.
    pub async fn repair(&self, partial: &PartialWrite) -> RecordResult<()> {
        self.records.repair(partial).await?;
        info!(entity = self.spec.name, path = %partial.failed.path, "move repaired");
        Ok(())
    }
}

impl std::fmt::Debug for CategoryMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryMutator")
            .field("entity", &self.spec.name)
            .field("records", &self.records)
            .finish()
    }
}

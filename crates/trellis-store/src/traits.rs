use std::sync::Arc;

use async_trait::async_trait;
use trellis_types::{DocPath, Node, WriteMode};

use crate::error::StoreResult;

/// Hierarchical document store addressed by slash-delimited paths.
///
/// All implementations must satisfy these invariants:
/// - A missing node reads as `Ok(None)`, never as an error.
/// - `Replace` discards the previous node; `Merge` is a shallow key-wise
///   union where the new keys win. Merge onto a non-mapping (or with a
///   non-mapping) behaves as Replace.
/// - Writing `null` with `Replace` removes the node; `null`-valued keys in a
///   `Merge` patch remove those keys.
/// - Delete is idempotent. Mappings emptied by a delete are pruned.
/// - Each single call is atomic; the store offers nothing across calls.
/// - All backend failures are returned, never silently ignored.
#[async_trait]
pub trait PathStore: Send + Sync {
    /// Read the node at `path`.
    async fn read(&self, path: &DocPath) -> StoreResult<Option<Node>>;

    /// Write `node` at `path`, creating missing intermediate mappings.
    async fn write(&self, path: &DocPath, node: Node, mode: WriteMode) -> StoreResult<()>;

    /// Remove the node at `path`. Removing an absent node succeeds.
    async fn delete(&self, path: &DocPath) -> StoreResult<()>;

    /// Check whether a node exists at `path`.
    async fn exists(&self, path: &DocPath) -> StoreResult<bool> {
        Ok(self.read(path).await?.is_some())
    }
}

#[async_trait]
impl<S: PathStore + ?Sized> PathStore for Arc<S> {
    async fn read(&self, path: &DocPath) -> StoreResult<Option<Node>> {
        (**self).read(path).await
    }

    async fn write(&self, path: &DocPath, node: Node, mode: WriteMode) -> StoreResult<()> {
        (**self).write(path, node, mode).await
    }

    async fn delete(&self, path: &DocPath) -> StoreResult<()> {
        (**self).delete(path).await
    }

    async fn exists(&self, path: &DocPath) -> StoreResult<bool> {
        (**self).exists(path).await
    }
}

use std::sync::RwLock;

use async_trait::async_trait;
use trellis_types::{DocPath, Node, WriteMode};

use crate::error::{StoreError, StoreResult};
use crate::traits::PathStore;
use crate::tree;

/// In-memory document tree.
///
/// Intended for tests and embedding. The tree lives behind a `RwLock`; the
/// lock is never held across an await point, so each call is atomic with
/// respect to every other call on the same store.
pub struct InMemoryPathStore {
    tree: RwLock<Node>,
}

impl InMemoryPathStore {
    /// Create a store holding an empty root mapping.
    pub fn new() -> Self {
        Self::with_tree(tree::empty_tree())
    }

    /// Create a store seeded with an existing tree.
    pub fn with_tree(root: Node) -> Self {
        Self {
            tree: RwLock::new(root),
        }
    }

    /// A copy of the whole tree.
    pub fn snapshot(&self) -> StoreResult<Node> {
        let tree = self.tree.read().map_err(poisoned)?;
        Ok(tree.clone())
    }

    /// Returns `true` if the root mapping has no children.
    pub fn is_empty(&self) -> StoreResult<bool> {
        let tree = self.tree.read().map_err(poisoned)?;
        Ok(tree.as_object().map_or(true, |map| map.is_empty()))
    }
}

impl Default for InMemoryPathStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Unavailable(format!("lock poisoned: {e}"))
}

#[async_trait]
impl PathStore for InMemoryPathStore {
    async fn read(&self, path: &DocPath) -> StoreResult<Option<Node>> {
        let tree = self.tree.read().map_err(poisoned)?;
        Ok(tree::get(&tree, path).cloned())
    }

    async fn write(&self, path: &DocPath, node: Node, mode: WriteMode) -> StoreResult<()> {
        let mut tree = self.tree.write().map_err(poisoned)?;
        tree::put(&mut tree, path, node, mode)
    }

    async fn delete(&self, path: &DocPath) -> StoreResult<()> {
        let mut tree = self.tree.write().map_err(poisoned)?;
        tree::remove(&mut tree, path)?;
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryPathStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let top_level = self
            .tree
            .read()
            .ok()
            .and_then(|t| t.as_object().map(|m| m.len()))
            .unwrap_or(0);
        f.debug_struct("InMemoryPathStore")
            .field("top_level_keys", &top_level)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn p(s: &str) -> DocPath {
        DocPath::parse(s).unwrap()
    }

    // -----------------------------------------------------------------------
    // Core read / write / delete
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn read_missing_returns_none() {
        let store = InMemoryPathStore::new();
        assert!(store.read(&p("nothing/here")).await.unwrap().is_none());
        assert!(!store.exists(&p("nothing")).await.unwrap());
    }

    #[tokio::test]
    async fn write_then_read() {
        let store = InMemoryPathStore::new();
        let node = json!({"name": "Opening", "venue": "Hall A"});
        store.write(&p("events/tech/e1"), node.clone(), WriteMode::Replace).await.unwrap();
        assert_eq!(store.read(&p("events/tech/e1")).await.unwrap(), Some(node));
        assert!(store.exists(&p("events/tech")).await.unwrap());
    }

    #[tokio::test]
    async fn merge_versus_replace() {
        let store = InMemoryPathStore::new();
        let path = p("sponsors/gold/id1");
        store.write(&path, json!({"x": 0, "y": 2}), WriteMode::Replace).await.unwrap();

        store.write(&path, json!({"x": 1}), WriteMode::Merge).await.unwrap();
        assert_eq!(store.read(&path).await.unwrap(), Some(json!({"x": 1, "y": 2})));

        store.write(&path, json!({"x": 1}), WriteMode::Replace).await.unwrap();
        assert_eq!(store.read(&path).await.unwrap(), Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryPathStore::new();
        let path = p("notifications/all/n1");
        store.write(&path, json!({"title": "hi"}), WriteMode::Replace).await.unwrap();
        store.delete(&path).await.unwrap();
        assert!(store.read(&path).await.unwrap().is_none());
        store.delete(&path).await.unwrap();
        store.delete(&p("never/written")).await.unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn seeded_tree_is_visible() {
        let store = InMemoryPathStore::with_tree(json!({"teams": {"core": {"members": [{"name": "A"}]}}}));
        let member = store.read(&p("teams/core/members/0")).await.unwrap();
        assert_eq!(member, Some(json!({"name": "A"})));
        assert_eq!(store.snapshot().unwrap()["teams"]["core"]["members"][0]["name"], "A");
    }

    #[tokio::test]
    async fn shape_conflict_is_reported() {
        let store = InMemoryPathStore::with_tree(json!({"flag": true}));
        let err = store.write(&p("flag/inner"), json!(1), WriteMode::Replace).await.unwrap_err();
        assert!(matches!(err, StoreError::ShapeConflict { .. }));
        assert!(!err.is_unavailable());
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn concurrent_writes_to_distinct_paths_all_land() {
        let store = Arc::new(InMemoryPathStore::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let path = DocPath::parse(&format!("users/staff/u{i}")).unwrap();
                    store.write(&path, json!({"n": i}), WriteMode::Replace).await.unwrap();
                })
            })
            .collect();
        for h in handles {
            h.await.expect("task should not panic");
        }
        let staff = store.read(&p("users/staff")).await.unwrap().unwrap();
        assert_eq!(staff.as_object().unwrap().len(), 16);
    }

    #[test]
    fn debug_format() {
        let store = InMemoryPathStore::with_tree(json!({"a": 1, "b": 2}));
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryPathStore"));
        assert!(debug.contains("top_level_keys: 2"));
    }
}

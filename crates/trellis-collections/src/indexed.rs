//! A sequence of records identified by array position.
//!
//! The collection lives at `{parent}/members`. Every mutation reads the whole
//! sequence, changes it in memory and writes it back with Replace. There is
//! no per-element addressing at the store layer, so:
//!
//! - two concurrent mutations race, and the last write wins;
//! - after `remove_at(i)` every index `>= i` held by any caller refers to a
//!   different record (or to nothing).
//!
//! The unchecked operations keep exactly those semantics. The `_checked`
//! variants take the [`VersionToken`] from a [`snapshot`](IndexedCollection::snapshot)
//! and refuse to write if the sequence changed since.

use std::sync::Arc;

use tracing::debug;
use trellis_store::{tree, PathStore};
use trellis_types::{DocPath, Node, Record, WriteMode};

use crate::error::{CollectionError, CollectionResult};
use crate::version::VersionToken;

/// Members plus the version they were read at.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedSnapshot {
    pub members: Vec<Record>,
    pub version: VersionToken,
}

/// Array-indexed view over `{parent}/members`.
#[derive(Clone)]
pub struct IndexedCollection {
    store: Arc<dyn PathStore>,
    members: DocPath,
}

impl IndexedCollection {
    pub fn new(store: Arc<dyn PathStore>, parent: &DocPath) -> CollectionResult<Self> {
        Ok(Self {
            store,
            members: parent.child("members")?,
        })
    }

    pub fn members_path(&self) -> &DocPath {
        &self.members
    }

    /// All members in order. An absent parent is an empty collection.
    pub async fn list(&self) -> CollectionResult<Vec<Record>> {
        let Some(node) = self.store.read(&self.members).await? else {
            return Ok(Vec::new());
        };
        let Node::Array(items) = node else {
            return Err(CollectionError::malformed(&self.members, "members is not a sequence"));
        };
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Node::Object(record) => Ok(record),
                _ => Err(CollectionError::malformed(
                    &self.members.index(index),
                    "member is not a mapping",
                )),
            })
            .collect()
    }

    /// All members plus a version token for the checked operations.
    pub async fn snapshot(&self) -> CollectionResult<IndexedSnapshot> {
        let members = self.list().await?;
        let version = VersionToken::of(&members);
        Ok(IndexedSnapshot { members, version })
    }

    pub async fn len(&self) -> CollectionResult<usize> {
        Ok(self.list().await?.len())
    }

    pub async fn get_by_index(&self, index: usize) -> CollectionResult<Record> {
        let mut members = self.list().await?;
        if index >= members.len() {
            return Err(CollectionError::not_found(self.members.index(index)));
        }
        Ok(members.swap_remove(index))
    }

    /// Current index of the first member matching `predicate`.
    pub async fn position<F>(&self, predicate: F) -> CollectionResult<Option<usize>>
    where
        F: Fn(&Record) -> bool + Send,
    {
        Ok(self.list().await?.iter().position(predicate))
    }

    /// Append a member and return its index as of this write.
    pub async fn append(&self, record: Record) -> CollectionResult<usize> {
        let mut members = self.list().await?;
        members.push(record);
        let index = members.len() - 1;
        self.store_members(members).await?;
        debug!(path = %self.members, index, "member appended");
        Ok(index)
    }

    /// Merge `patch` into the member at `index`.
    pub async fn update_at(&self, index: usize, patch: Record) -> CollectionResult<()> {
        let members = self.list().await?;
        self.apply_update(members, index, patch).await
    }

    /// Remove the member at `index`; later members shift down by one.
    pub async fn remove_at(&self, index: usize) -> CollectionResult<Record> {
        let members = self.list().await?;
        self.apply_remove(members, index).await
    }

    /// [`update_at`](Self::update_at), refused if the sequence changed since `version`.
    pub async fn update_at_checked(
        &self,
        index: usize,
        patch: Record,
        version: &VersionToken,
    ) -> CollectionResult<()> {
        let members = self.list().await?;
        self.ensure_version(&members, version)?;
        self.apply_update(members, index, patch).await
    }

    /// [`remove_at`](Self::remove_at), refused if the sequence changed since `version`.
    pub async fn remove_at_checked(&self, index: usize, version: &VersionToken) -> CollectionResult<Record> {
        let members = self.list().await?;
        self.ensure_version(&members, version)?;
        self.apply_remove(members, index).await
    }

    /// Remove the whole sequence. Removing an absent sequence succeeds.
    pub async fn clear(&self) -> CollectionResult<()> {
        self.store.delete(&self.members).await?;
        Ok(())
    }

    fn ensure_version(&self, members: &[Record], expected: &VersionToken) -> CollectionResult<()> {
        let found = VersionToken::of(members);
        if found != *expected {
            return Err(CollectionError::ConcurrentModification {
                path: self.members.clone(),
                expected: *expected,
                found,
            });
        }
        Ok(())
    }

    async fn apply_update(&self, mut members: Vec<Record>, index: usize, patch: Record) -> CollectionResult<()> {
        let Some(member) = members.get_mut(index) else {
            return Err(CollectionError::not_found(self.members.index(index)));
        };
        let mut merged = Node::Object(std::mem::take(member));
        tree::merge_node(&mut merged, Node::Object(patch));
        if let Node::Object(record) = merged {
            *member = record;
        }
        self.store_members(members).await?;
        debug!(path = %self.members, index, "member updated");
        Ok(())
    }

    async fn apply_remove(&self, mut members: Vec<Record>, index: usize) -> CollectionResult<Record> {
        if index >= members.len() {
            return Err(CollectionError::not_found(self.members.index(index)));
        }
        let removed = members.remove(index);
        self.store_members(members).await?;
        debug!(path = %self.members, index, "member removed; later indices shifted");
        Ok(removed)
    }

    async fn store_members(&self, members: Vec<Record>) -> CollectionResult<()> {
        let node = Node::Array(members.into_iter().map(Node::Object).collect());
        self.store.write(&self.members, node, WriteMode::Replace).await?;
        Ok(())
    }
}

impl std::fmt::Debug for IndexedCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedCollection")
            .field("members", &self.members)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_store::{Fault, InMemoryPathStore, InstrumentedStore};

    fn rec(v: Node) -> Record {
        v.as_object().unwrap().clone()
    }

    fn named(name: &str) -> Record {
        rec(json!({ "name": name }))
    }

    fn team(store: Arc<dyn PathStore>) -> IndexedCollection {
        IndexedCollection::new(store, &DocPath::parse("teams/core").unwrap()).unwrap()
    }

    async fn abc() -> IndexedCollection {
        let roster = team(Arc::new(InMemoryPathStore::new()));
        for name in ["A", "B", "C"] {
            roster.append(named(name)).await.unwrap();
        }
        roster
    }

    #[tokio::test]
    async fn absent_parent_lists_empty() {
        let roster = team(Arc::new(InMemoryPathStore::new()));
        assert!(roster.list().await.unwrap().is_empty());
        assert_eq!(roster.len().await.unwrap(), 0);
        assert!(roster.get_by_index(0).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn append_returns_positions() {
        let roster = team(Arc::new(InMemoryPathStore::new()));
        assert_eq!(roster.append(named("A")).await.unwrap(), 0);
        assert_eq!(roster.append(named("B")).await.unwrap(), 1);
        assert_eq!(roster.get_by_index(1).await.unwrap(), named("B"));
    }

    #[tokio::test]
    async fn remove_shifts_later_indices() {
        let roster = abc().await;
        let removed = roster.remove_at(0).await.unwrap();
        assert_eq!(removed, named("A"));
        assert_eq!(roster.list().await.unwrap(), vec![named("B"), named("C")]);
        // Index 1 used to be B; it is now C.
        assert_eq!(roster.get_by_index(1).await.unwrap(), named("C"));
    }

    #[tokio::test]
    async fn stale_index_update_silently_hits_another_member() {
        let roster = abc().await;
        // A caller read the list and plans to edit C at index 2...
        let stale = 2;
        // ...meanwhile another caller removes A.
        roster.remove_at(0).await.unwrap();

        // Index 2 is now out of range.
        assert!(roster.update_at(stale, named("C2")).await.unwrap_err().is_not_found());

        // And index 1, which was B, now lands on C without any error.
        roster.update_at(1, rec(json!({"role": "meant for B"}))).await.unwrap();
        let c = roster.get_by_index(1).await.unwrap();
        assert_eq!(c["name"], "C");
        assert_eq!(c["role"], "meant for B");
    }

    #[tokio::test]
    async fn update_merges_into_member() {
        let roster = abc().await;
        roster.update_at(1, rec(json!({"role": "lead"}))).await.unwrap();
        assert_eq!(roster.get_by_index(1).await.unwrap(), rec(json!({"name": "B", "role": "lead"})));
        roster.update_at(1, rec(json!({"role": null}))).await.unwrap();
        assert_eq!(roster.get_by_index(1).await.unwrap(), named("B"));
    }

    #[tokio::test]
    async fn out_of_range_mutations_are_not_found() {
        let roster = abc().await;
        assert!(roster.update_at(3, named("X")).await.unwrap_err().is_not_found());
        assert!(roster.remove_at(7).await.unwrap_err().is_not_found());
        assert_eq!(roster.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn checked_operations_reject_stale_snapshots() {
        let roster = abc().await;
        let snapshot = roster.snapshot().await.unwrap();

        roster.remove_at(0).await.unwrap();

        let err = roster.remove_at_checked(1, &snapshot.version).await.unwrap_err();
        assert!(matches!(err, CollectionError::ConcurrentModification { .. }));
        let err = roster
            .update_at_checked(0, named("Z"), &snapshot.version)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionError::ConcurrentModification { .. }));
        assert_eq!(roster.list().await.unwrap(), vec![named("B"), named("C")]);

        let fresh = roster.snapshot().await.unwrap();
        assert_eq!(roster.remove_at_checked(1, &fresh.version).await.unwrap(), named("C"));
    }

    #[tokio::test]
    async fn position_finds_current_index() {
        let roster = abc().await;
        assert_eq!(roster.position(|r| r["name"] == "C").await.unwrap(), Some(2));
        roster.remove_at(0).await.unwrap();
        assert_eq!(roster.position(|r| r["name"] == "C").await.unwrap(), Some(1));
        assert_eq!(roster.position(|r| r["name"] == "Q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn every_mutation_rewrites_the_whole_sequence() {
        let store = Arc::new(InstrumentedStore::new(InMemoryPathStore::new()));
        let roster = team(store.clone());
        roster.append(named("A")).await.unwrap();
        roster.append(named("B")).await.unwrap();
        roster.update_at(0, named("A2")).await.unwrap();
        roster.remove_at(1).await.unwrap();

        let members = DocPath::parse("teams/core/members").unwrap();
        assert_eq!(store.writes(), vec![members.clone(); 4]);
    }

    #[tokio::test]
    async fn failed_write_leaves_sequence_unchanged() {
        let store = Arc::new(InstrumentedStore::new(InMemoryPathStore::new()));
        let roster = team(store.clone());
        roster.append(named("A")).await.unwrap();
        store.inject(Fault::on_writes());
        let err = roster.remove_at(0).await.unwrap_err();
        assert!(matches!(err, CollectionError::Store(_)));
        store.clear_faults();
        assert_eq!(roster.list().await.unwrap(), vec![named("A")]);
    }

    #[tokio::test]
    async fn malformed_members_are_reported() {
        let store = Arc::new(InMemoryPathStore::with_tree(json!({"teams": {"core": {"members": {"0": {}}}}})));
        let err = team(store).list().await.unwrap_err();
        assert!(matches!(err, CollectionError::Malformed { .. }));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let roster = abc().await;
        roster.clear().await.unwrap();
        roster.clear().await.unwrap();
        assert!(roster.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_appends_may_lose_one() {
        // Documents the read-modify-write race: two appends that both read the
        // same sequence each write back their own extension.
        let store: Arc<dyn PathStore> = Arc::new(InMemoryPathStore::new());
        let roster = team(store.clone());
        let before = roster.list().await.unwrap();

        let mut first = before.clone();
        first.push(named("X"));
        let mut second = before;
        second.push(named("Y"));
        roster.store_members(first).await.unwrap();
        roster.store_members(second).await.unwrap();

        assert_eq!(roster.list().await.unwrap(), vec![named("Y")]);
    }
}

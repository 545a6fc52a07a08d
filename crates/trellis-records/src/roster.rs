//! Team rosters: members stored as a sequence under `teams/{team}/members`.
//!
//! A member's index is its identity at the adapter level and is only valid
//! as of the read that produced it: removing member `i` shifts every later
//! member down by one, and a caller still holding the old index will touch
//! the wrong member. Each member therefore also carries a stable `memberId`;
//! [`RosterMutator::index_of`] maps it to the current index, and the
//! `_checked` operations refuse to write over a sequence that changed since
//! it was read.

use std::fmt;
use std::sync::Arc;

use tracing::info;
use trellis_assets::AssetUploader;
use trellis_collections::{IndexedCollection, IndexedSnapshot, VersionToken};
use trellis_store::PathStore;
use trellis_types::{DocPath, Node, Record, RecordId};

use crate::asset::resolve_asset;
use crate::entity::{Change, MEMBER};
use crate::error::{RecordError, RecordResult};

/// Stable per-member id field.
pub const MEMBER_ID: &str = "memberId";

/// Where a member landed, as of the write that placed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberKey {
    pub team: String,
    pub index: usize,
    pub member_id: RecordId,
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] ({})", self.team, self.index, self.member_id)
    }
}

#[derive(Clone)]
pub struct RosterMutator {
    store: Arc<dyn PathStore>,
    teams: DocPath,
    uploader: Arc<dyn AssetUploader>,
}

impl RosterMutator {
    pub fn new(store: Arc<dyn PathStore>, teams: DocPath, uploader: Arc<dyn AssetUploader>) -> Self {
        Self {
            store,
            teams,
            uploader,
        }
    }

    /// The indexed collection of one team.
    pub fn members(&self, team: &str) -> RecordResult<IndexedCollection> {
        Ok(IndexedCollection::new(self.store.clone(), &self.teams.child(team)?)?)
    }

    /// Names of all teams present in the tree.
    pub async fn teams(&self) -> RecordResult<Vec<String>> {
        match self.store.read(&self.teams).await? {
            Some(Node::Object(teams)) => Ok(teams.keys().cloned().collect()),
            Some(_) => Err(RecordError::Malformed {
                path: self.teams.clone(),
                reason: "teams root is not a mapping".into(),
            }),
            None => Ok(Vec::new()),
        }
    }

    pub async fn list(&self, team: &str) -> RecordResult<Vec<Record>> {
        Ok(self.members(team)?.list().await?)
    }

    /// Members plus the version token the checked operations expect.
    pub async fn snapshot(&self, team: &str) -> RecordResult<IndexedSnapshot> {
        Ok(self.members(team)?.snapshot().await?)
    }

    pub async fn get(&self, team: &str, index: usize) -> RecordResult<Record> {
        Ok(self.members(team)?.get_by_index(index).await?)
    }

    /// Current index of the member with `member_id`.
    pub async fn index_of(&self, team: &str, member_id: &RecordId) -> RecordResult<Option<usize>> {
        Ok(self
            .members(team)?
            .position(|member| member_id_of(member) == Some(member_id.as_str()))
            .await?)
    }

    /// Append a member. A `memberId` is generated unless the change
    /// supplies one that is not already in use.
    pub async fn add(&self, team: &str, mut change: Change) -> RecordResult<MemberKey> {
        MEMBER.validate_new(&change.fields)?;
        let members = self.members(team)?;
        let member_id = match change.fields.get(MEMBER_ID) {
            Some(Node::String(id)) => {
                let id = RecordId::new(id.as_str())?;
                if self.index_of(team, &id).await?.is_some() {
                    return Err(RecordError::AlreadyExists(format!("member {id} in team {team}")));
                }
                id
            }
            Some(_) => return Err(RecordError::invalid("member: memberId must be text")),
            None => RecordId::generate(),
        };

        resolve_asset(self.uploader.as_ref(), &MEMBER, &mut change).await?;
        change
            .fields
            .insert(MEMBER_ID.to_string(), Node::String(member_id.to_string()));
        let index = members.append(change.fields).await?;
        let key = MemberKey {
            team: team.to_string(),
            index,
            member_id,
        };
        info!(%key, "member added");
        Ok(key)
    }

    /// Merge `change` into the member currently at `index`.
    ///
    /// The index is not re-validated against the caller's earlier read; see
    /// [`update_checked`](Self::update_checked).
    pub async fn update(&self, team: &str, index: usize, mut change: Change) -> RecordResult<()> {
        let members = self.members(team)?;
        let current = members.get_by_index(index).await?;
        check_patch(&current, &change)?;

        resolve_asset(self.uploader.as_ref(), &MEMBER, &mut change).await?;
        members.update_at(index, change.fields).await?;
        info!(team, index, "member updated");
        Ok(())
    }

    /// [`update`](Self::update), refused with `ConcurrentModification` if the
    /// roster changed since `version` was read.
    pub async fn update_checked(
        &self,
        team: &str,
        index: usize,
        version: &VersionToken,
        mut change: Change,
    ) -> RecordResult<()> {
        let members = self.members(team)?;
        let snapshot = members.snapshot().await?;
        if snapshot.version != *version {
            return Err(RecordError::ConcurrentModification {
                path: members.members_path().clone(),
                expected: *version,
                found: snapshot.version,
            });
        }
        let current = snapshot
            .members
            .get(index)
            .ok_or_else(|| RecordError::NotFound(members.members_path().index(index).to_string()))?;
        check_patch(current, &change)?;

        resolve_asset(self.uploader.as_ref(), &MEMBER, &mut change).await?;
        members.update_at_checked(index, change.fields, version).await?;
        info!(team, index, %version, "member updated (checked)");
        Ok(())
    }

    /// Remove the member at `index`; later members shift down by one.
    pub async fn remove(&self, team: &str, index: usize) -> RecordResult<Record> {
        let removed = self.members(team)?.remove_at(index).await?;
        info!(team, index, "member removed");
        Ok(removed)
    }

    pub async fn remove_checked(&self, team: &str, index: usize, version: &VersionToken) -> RecordResult<Record> {
        let removed = self.members(team)?.remove_at_checked(index, version).await?;
        info!(team, index, %version, "member removed (checked)");
        Ok(removed)
    }

    /// Update by stable id. Returns the index the member was found at.
    pub async fn update_member(&self, team: &str, member_id: &RecordId, change: Change) -> RecordResult<usize> {
        let index = self.require_index(team, member_id).await?;
        self.update(team, index, change).await?;
        Ok(index)
    }

    pub async fn remove_member(&self, team: &str, member_id: &RecordId) -> RecordResult<Record> {
        let index = self.require_index(team, member_id).await?;
        self.remove(team, index).await
    }

    async fn require_index(&self, team: &str, member_id: &RecordId) -> RecordResult<usize> {
        self.index_of(team, member_id)
            .await?
            .ok_or_else(|| RecordError::NotFound(format!("member {member_id} in team {team}")))
    }
}

fn member_id_of(member: &Record) -> Option<&str> {
    member.get(MEMBER_ID).and_then(Node::as_str)
}

fn check_patch(current: &Record, change: &Change) -> RecordResult<()> {
    MEMBER.validate_patch(change)?;
    match change.fields.get(MEMBER_ID) {
        None => Ok(()),
        Some(Node::String(id)) if Some(id.as_str()) == member_id_of(current) => Ok(()),
        Some(_) => Err(RecordError::invalid("member: memberId cannot be changed")),
    }
}

impl fmt::Debug for RosterMutator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RosterMutator").field("teams", &self.teams).finish()
    }
}

//! Description of a two-step write that only half happened.

use std::fmt;

use serde::{Deserialize, Serialize};
use trellis_store::{PathStore, StoreError, StoreResult};
use trellis_types::{DocPath, Node, RecordId, WriteMode};

/// The multi-path operations that can end half-done.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoStepKind {
    /// Delete from the old category, then create in the new one.
    MoveCategory,
    /// Write the summary projection, then the detail projection.
    WriteBoth,
    /// Delete the summary projection, then the detail projection.
    DeleteBoth,
}

impl fmt::Display for TwoStepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoveCategory => f.write_str("category move"),
            Self::WriteBoth => f.write_str("dual-projection write"),
            Self::DeleteBoth => f.write_str("dual-projection delete"),
        }
    }
}

/// What a step was for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    Summary,
    Detail,
    RemoveFromOld,
    WriteToNew,
}

impl fmt::Display for StepRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Summary => f.write_str("summary"),
            Self::Detail => f.write_str("detail"),
            Self::RemoveFromOld => f.write_str("removal from old category"),
            Self::WriteToNew => f.write_str("write to new category"),
        }
    }
}

/// The store call a step performs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    Write { node: Node, mode: WriteMode },
    Delete,
}

/// One single-path store call within a two-step operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub role: StepRole,
    pub path: DocPath,
    #[serde(flatten)]
    pub action: StepAction,
}

impl Step {
    pub fn write(role: StepRole, path: DocPath, node: Node, mode: WriteMode) -> Self {
        Self {
            role,
            path,
            action: StepAction::Write { node, mode },
        }
    }

    pub fn delete(role: StepRole, path: DocPath) -> Self {
        Self {
            role,
            path,
            action: StepAction::Delete,
        }
    }

    /// Whether `current`, the node now at this step's path, already reflects
    /// the step. A merge holds when every patched key has its patched value
    /// (null meaning absent).
    pub fn holds(&self, current: Option<&Node>) -> bool {
        match (&self.action, current) {
            (StepAction::Delete, current) => current.is_none(),
            (StepAction::Write { node, mode: WriteMode::Replace }, current) => match current {
                Some(current) => current == node,
                None => node.is_null(),
            },
            (StepAction::Write { node: Node::Object(patch), mode: WriteMode::Merge }, current) => {
                let fields = current.and_then(Node::as_object);
                patch.iter().all(|(key, value)| {
                    let now = fields.and_then(|fields| fields.get(key));
                    if value.is_null() {
                        now.is_none()
                    } else {
                        now == Some(value)
                    }
                })
            }
            (StepAction::Write { node, mode: WriteMode::Merge }, current) => current == Some(node),
        }
    }

    /// Perform this step against `store`.
    pub async fn run<S: PathStore + ?Sized>(&self, store: &S) -> StoreResult<()> {
        match &self.action {
            StepAction::Write { node, mode } => store.write(&self.path, node.clone(), *mode).await,
            StepAction::Delete => store.delete(&self.path).await,
        }
    }
}

/// A two-step operation whose first step landed and whose second failed.
///
/// No rollback is attempted. The failed step carries everything needed to
/// re-run it, and `intent` names the intent-log entry when one was kept.
#[derive(Debug, thiserror::Error)]
#[error(
    "partial write during {kind}: {} at {} succeeded, {} at {} failed ({cause}); manual repair required",
    .completed.role, .completed.path, .failed.role, .failed.path
)]
pub struct PartialWrite {
    pub kind: TwoStepKind,
    pub completed: Step,
    pub failed: Step,
    pub intent: Option<RecordId>,
    #[source]
    pub cause: StoreError,
}

impl PartialWrite {
    pub fn summary_succeeded(&self) -> bool {
        self.completed.role == StepRole::Summary
    }

    pub fn detail_succeeded(&self) -> bool {
        self.completed.role == StepRole::Detail
    }

    /// Re-run the step that failed.
    pub async fn retry_failed_step<S: PathStore + ?Sized>(&self, store: &S) -> StoreResult<()> {
        self.failed.run(store).await
    }
}

//! Optional journal of in-flight two-step writes.
//!
//! Before the first step of a category move or dual-projection write, the
//! full plan (both steps, with payloads) is written under `_intents/{id}`.
//! The entry is removed once both steps land. An entry that survives names
//! an operation that stopped halfway, with enough data to finish it by hand.
//! Each entry also keeps the nodes found at both paths when it was recorded,
//! so a replay can tell an interrupted step from one overtaken by later writes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use trellis_store::PathStore;
use trellis_types::{DocPath, Node, RecordId, WriteMode};

use crate::error::{CollectionError, CollectionResult};
use crate::partial::{Step, TwoStepKind};

/// Default location of the intent journal.
pub const DEFAULT_INTENT_ROOT: &str = "_intents";

/// A recorded two-step operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub id: RecordId,
    pub kind: TwoStepKind,
    pub first: Step,
    pub second: Step,
    /// Node at `first.path` when the intent was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_before: Option<Node>,
    /// Node at `second.path` when the intent was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_before: Option<Node>,
    pub created_at: DateTime<Utc>,
}

/// Intent journal stored in the document tree itself.
#[derive(Clone)]
pub struct IntentLog {
    store: Arc<dyn PathStore>,
    root: DocPath,
}

impl IntentLog {
    pub fn new(store: Arc<dyn PathStore>) -> Self {
        Self {
            store,
            root: DocPath::root()
                .child(DEFAULT_INTENT_ROOT)
                .unwrap_or_default(),
        }
    }

    pub fn with_root(store: Arc<dyn PathStore>, root: DocPath) -> Self {
        Self { store, root }
    }

    pub fn root(&self) -> &DocPath {
        &self.root
    }

    fn entry_path(&self, id: &RecordId) -> CollectionResult<DocPath> {
        Ok(self.root.child(id.as_str())?)
    }

    /// Record a plan before its first step runs.
    pub async fn begin(&self, kind: TwoStepKind, first: &Step, second: &Step) -> CollectionResult<RecordId> {
        let intent = Intent {
            id: RecordId::generate(),
            kind,
            first: first.clone(),
            second: second.clone(),
            first_before: self.store.read(&first.path).await?,
            second_before: self.store.read(&second.path).await?,
            created_at: Utc::now(),
        };
        let node = serde_json::to_value(&intent).map_err(|e| {
            CollectionError::malformed(&self.root, format!("intent not serializable: {e}"))
        })?;
        self.store
            .write(&self.entry_path(&intent.id)?, node, WriteMode::Replace)
            .await?;
        debug!(intent = %intent.id, %kind, "intent recorded");
        Ok(intent.id)
    }

    /// Remove an intent once its operation has fully landed.
    ///
    /// A failure here leaves a stale entry behind; it is logged, not returned,
    /// because the operation itself succeeded.
    pub async fn complete(&self, id: &RecordId) {
        let result = match self.entry_path(id) {
            Ok(path) => self.store.delete(&path).await.map_err(CollectionError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(intent = %id, error = %e, "failed to clear completed intent");
        }
    }

    /// Remove an intent after it was repaired by hand.
    pub async fn resolve(&self, id: &RecordId) -> CollectionResult<()> {
        self.store.delete(&self.entry_path(id)?).await?;
        Ok(())
    }

    /// Finish a recorded operation, then remove the entry.
    ///
    /// A step whose path already reflects it is skipped. A step whose path
    /// still holds the node recorded before the operation is run. Any other
    /// node means the path was written after the operation stopped; the
    /// replay is refused with [`CollectionError::StaleIntent`] and the entry
    /// is kept for manual repair or [`resolve`](Self::resolve).
    pub async fn replay(&self, id: &RecordId) -> CollectionResult<Intent> {
        let intent = self.get(id).await?;
        let first_now = self.store.read(&intent.first.path).await?;
        let second_now = self.store.read(&intent.second.path).await?;
        let run_first = self.needs_run(&intent, &intent.first, first_now, &intent.first_before)?;
        let run_second = self.needs_run(&intent, &intent.second, second_now, &intent.second_before)?;

        if run_first {
            intent.first.run(self.store.as_ref()).await?;
        }
        if run_second {
            intent.second.run(self.store.as_ref()).await?;
        }
        self.resolve(id).await?;
        debug!(intent = %id, kind = %intent.kind, run_first, run_second, "intent replayed");
        Ok(intent)
    }

    fn needs_run(
        &self,
        intent: &Intent,
        step: &Step,
        now: Option<Node>,
        before: &Option<Node>,
    ) -> CollectionResult<bool> {
        if step.holds(now.as_ref()) {
            return Ok(false);
        }
        if now == *before {
            return Ok(true);
        }
        warn!(intent = %intent.id, path = %step.path, "intent target changed after it was recorded");
        Err(CollectionError::StaleIntent {
            id: intent.id.clone(),
            path: step.path.clone(),
        })
    }

    pub async fn get(&self, id: &RecordId) -> CollectionResult<Intent> {
        let path = self.entry_path(id)?;
        let node = self
            .store
            .read(&path)
            .await?
            .ok_or_else(|| CollectionError::not_found(path.clone()))?;
        decode(&path, node)
    }

    /// Every unfinished intent, oldest first.
    pub async fn pending(&self) -> CollectionResult<Vec<Intent>> {
        let Some(node) = self.store.read(&self.root).await? else {
            return Ok(Vec::new());
        };
        let Node::Object(entries) = node else {
            return Err(CollectionError::malformed(&self.root, "intent journal is not a mapping"));
        };
        let mut intents = entries
            .into_iter()
            .map(|(key, node)| {
                let path = self.root.child(key)?;
                decode(&path, node)
            })
            .collect::<CollectionResult<Vec<_>>>()?;
        intents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(intents)
    }
}

fn decode(path: &DocPath, node: Node) -> CollectionResult<Intent> {
    serde_json::from_value(node)
        .map_err(|e| CollectionError::malformed(path, format!("unreadable intent: {e}")))
}

impl std::fmt::Debug for IntentLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentLog").field("root", &self.root).finish()
    }
}

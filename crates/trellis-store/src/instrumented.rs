//! Operation journal and fault injection around any [`PathStore`].
//!
//! [`InstrumentedStore`] records every call it receives (successful or not)
//! and can be told to fail selected calls. Collections and mutators use it
//! in tests to prove ordering properties ("no write happened before the
//! upload") and to reproduce partial failures deterministically.

use std::sync::Mutex;

use async_trait::async_trait;
use trellis_types::{DocPath, Node, WriteMode};

use crate::error::{StoreError, StoreResult};
use crate::traits::PathStore;

/// One recorded store call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreOp {
    Read(DocPath),
    Write { path: DocPath, mode: WriteMode },
    Delete(DocPath),
}

impl StoreOp {
    pub fn path(&self) -> &DocPath {
        match self {
            Self::Read(path) | Self::Delete(path) => path,
            Self::Write { path, .. } => path,
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Read(_))
    }
}

/// Which calls a [`Fault`] applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultOps {
    Reads,
    Writes,
    Deletes,
    /// Writes and deletes.
    Mutations,
}

impl FaultOps {
    fn matches(self, op: &StoreOp) -> bool {
        match (self, op) {
            (Self::Reads, StoreOp::Read(_)) => true,
            (Self::Writes, StoreOp::Write { .. }) => true,
            (Self::Deletes, StoreOp::Delete(_)) => true,
            (Self::Mutations, op) => op.is_mutation(),
            _ => false,
        }
    }
}

/// A rule that turns matching calls into [`StoreError::Unavailable`].
#[derive(Clone, Debug)]
pub struct Fault {
    ops: FaultOps,
    prefix: Option<DocPath>,
    skip: usize,
    times: Option<usize>,
}

impl Fault {
    fn new(ops: FaultOps) -> Self {
        Self {
            ops,
            prefix: None,
            skip: 0,
            times: None,
        }
    }

    pub fn on_reads() -> Self {
        Self::new(FaultOps::Reads)
    }

    pub fn on_writes() -> Self {
        Self::new(FaultOps::Writes)
    }

    pub fn on_deletes() -> Self {
        Self::new(FaultOps::Deletes)
    }

    pub fn on_mutations() -> Self {
        Self::new(FaultOps::Mutations)
    }

    /// Only match calls at or below `prefix`.
    pub fn under(mut self, prefix: DocPath) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Let the first `n` matching calls through.
    pub fn after(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    /// Fail at most `n` matching calls, then disarm.
    pub fn times(mut self, n: usize) -> Self {
        self.times = Some(n);
        self
    }

    fn trip(&mut self, op: &StoreOp) -> bool {
        if !self.ops.matches(op) {
            return false;
        }
        if let Some(prefix) = &self.prefix {
            if !op.path().starts_with(prefix) {
                return false;
            }
        }
        if self.skip > 0 {
            self.skip -= 1;
            return false;
        }
        match self.times.as_mut() {
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
            None => true,
        }
    }
}

/// A [`PathStore`] wrapper with a call journal and injectable faults.
pub struct InstrumentedStore<S> {
    inner: S,
    journal: Mutex<Vec<StoreOp>>,
    faults: Mutex<Vec<Fault>>,
}

impl<S: PathStore> InstrumentedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            journal: Mutex::new(Vec::new()),
            faults: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Arm a fault rule.
    pub fn inject(&self, fault: Fault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push(fault);
        }
    }

    /// Disarm every fault rule.
    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    /// Every call received so far, in order.
    pub fn journal(&self) -> Vec<StoreOp> {
        self.journal.lock().map(|j| j.clone()).unwrap_or_default()
    }

    /// Paths of every write call received so far.
    pub fn writes(&self) -> Vec<DocPath> {
        self.journal()
            .into_iter()
            .filter_map(|op| match op {
                StoreOp::Write { path, .. } => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Number of write and delete calls received so far.
    pub fn mutation_count(&self) -> usize {
        self.journal().iter().filter(|op| op.is_mutation()).count()
    }

    pub fn clear_journal(&self) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.clear();
        }
    }

    fn record(&self, op: StoreOp) -> StoreResult<()> {
        self.journal
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("journal lock poisoned: {e}")))?
            .push(op.clone());
        let mut faults = self
            .faults
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("fault lock poisoned: {e}")))?;
        // Every rule sees the call so stacked `after`/`times` counters advance together.
        let tripped = faults
            .iter_mut()
            .fold(false, |tripped, fault| fault.trip(&op) | tripped);
        if tripped {
            tracing::warn!(op = ?op, "injected store fault");
            return Err(StoreError::Unavailable(format!(
                "injected fault on {}",
                op.path()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: PathStore> PathStore for InstrumentedStore<S> {
    async fn read(&self, path: &DocPath) -> StoreResult<Option<Node>> {
        self.record(StoreOp::Read(path.clone()))?;
        self.inner.read(path).await
    }

    async fn write(&self, path: &DocPath, node: Node, mode: WriteMode) -> StoreResult<()> {
        self.record(StoreOp::Write {
            path: path.clone(),
            mode,
        })?;
        self.inner.write(path, node, mode).await
    }

    async fn delete(&self, path: &DocPath) -> StoreResult<()> {
        self.record(StoreOp::Delete(path.clone()))?;
        self.inner.delete(path).await
    }
}

impl<S> std::fmt::Debug for InstrumentedStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let calls = self.journal.lock().map(|j| j.len()).unwrap_or(0);
        f.debug_struct("InstrumentedStore")
            .field("calls", &calls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryPathStore;
    use serde_json::json;

    fn p(s: &str) -> DocPath {
        DocPath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn journal_records_calls_in_order() {
        let store = InstrumentedStore::new(InMemoryPathStore::new());
        store.write(&p("a/b"), json!(1), WriteMode::Replace).await.unwrap();
        store.read(&p("a/b")).await.unwrap();
        store.delete(&p("a/b")).await.unwrap();

        assert_eq!(
            store.journal(),
            vec![
                StoreOp::Write { path: p("a/b"), mode: WriteMode::Replace },
                StoreOp::Read(p("a/b")),
                StoreOp::Delete(p("a/b")),
            ]
        );
        assert_eq!(store.mutation_count(), 2);
        assert_eq!(store.writes(), vec![p("a/b")]);
    }

    #[tokio::test]
    async fn fault_under_prefix_only_hits_that_subtree() {
        let store = InstrumentedStore::new(InMemoryPathStore::new());
        store.inject(Fault::on_writes().under(p("eventDetails")));

        store.write(&p("events/x/1"), json!({"n": 1}), WriteMode::Replace).await.unwrap();
        let err = store
            .write(&p("eventDetails/x/1"), json!({"d": 1}), WriteMode::Replace)
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        assert!(store.inner().read(&p("eventDetails/x/1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fault_after_and_times() {
        let store = InstrumentedStore::new(InMemoryPathStore::new());
        store.inject(Fault::on_mutations().after(1).times(1));

        assert!(store.write(&p("a"), json!(1), WriteMode::Replace).await.is_ok());
        assert!(store.delete(&p("a")).await.is_err());
        assert!(store.write(&p("b"), json!(2), WriteMode::Replace).await.is_ok());
        assert_eq!(store.mutation_count(), 3);
    }

    #[tokio::test]
    async fn stacked_faults_all_count_each_call() {
        let store = InstrumentedStore::new(InMemoryPathStore::new());
        store.inject(Fault::on_writes().times(1));
        store.inject(Fault::on_writes().after(1).times(1));

        assert!(store.write(&p("a"), json!(1), WriteMode::Replace).await.is_err());
        assert!(store.write(&p("b"), json!(2), WriteMode::Replace).await.is_err());
        assert!(store.write(&p("c"), json!(3), WriteMode::Replace).await.is_ok());
    }

    #[tokio::test]
    async fn clear_faults_disarms() {
        let store = InstrumentedStore::new(InMemoryPathStore::new());
        store.inject(Fault::on_reads());
        assert!(store.read(&p("x")).await.is_err());
        store.clear_faults();
        assert!(store.read(&p("x")).await.unwrap().is_none());
        store.clear_journal();
        assert!(store.journal().is_empty());
    }
}

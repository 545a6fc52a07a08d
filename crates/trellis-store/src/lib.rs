//! Path-addressed document store for Trellis.
//!
//! The whole data set is one tree of JSON nodes. Every entity lives at a
//! slash-delimited [`DocPath`](trellis_types::DocPath) and is accessed
//! through three primitives:
//!
//! - `read(path)`: `Ok(None)` when nothing lives at `path`
//! - `write(path, node, mode)`: [`WriteMode::Replace`] or [`WriteMode::Merge`]
//! - `delete(path)`: idempotent
//!
//! # Storage Backends
//!
//! All backends implement the [`PathStore`] trait:
//!
//! - [`InMemoryPathStore`] -- lock-protected tree for tests and embedding
//! - [`JsonFileStore`] -- one JSON document on disk, rewritten atomically
//! - [`InstrumentedStore`] -- wraps any store with an operation journal and
//!   fault injection
//!
//! # Design Rules
//!
//! 1. A single-path write or delete is atomic. Sequences of writes are not.
//! 2. Connectivity and I/O failures surface as errors, never swallowed.
//! 3. Nothing is cached across calls; every read observes the latest
//!    committed tree.
//!
//! [`WriteMode::Replace`]: trellis_types::WriteMode::Replace
//! [`WriteMode::Merge`]: trellis_types::WriteMode::Merge

pub mod error;
pub mod file;
pub mod instrumented;
pub mod memory;
pub mod traits;
pub mod tree;

pub use error::{StoreError, StoreResult};
pub use file::{FileStoreConfig, JsonFileStore};
pub use instrumented::{Fault, FaultOps, InstrumentedStore, StoreOp};
pub use memory::InMemoryPathStore;
pub use traits::PathStore;

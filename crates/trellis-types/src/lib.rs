//! Foundation types for Trellis.
//!
//! Trellis keeps administrative records (events, sponsors, lectures,
//! notifications, team rosters, users) in one schemaless document tree.
//! Every other Trellis crate depends on `trellis-types`.
//!
//! # Key Types
//!
//! - [`Node`]: a node of the document tree (a JSON value)
//! - [`Record`]: a mapping node holding one entity's fields
//! - [`DocPath`]: a validated, slash-delimited location in the tree
//! - [`WriteMode`]: Replace vs Merge write semantics
//! - [`RecordId`]: generated (UUID v7) or name-derived entity id
//! - [`AssetPayload`] / [`AssetRef`]: binary assets pending upload or resolved

pub mod asset;
pub mod error;
pub mod id;
pub mod node;
pub mod path;

pub use asset::{AssetPayload, AssetRef};
pub use error::TypeError;
pub use id::RecordId;
pub use node::{Node, Record, WriteMode};
pub use path::DocPath;

//! Record mutators for Trellis.
//!
//! Every mutation follows the same pipeline:
//!
//! 1. validate required fields (`InvalidRecord`, nothing touched)
//! 2. upload a pending asset (`AssetUploadFailed`, nothing written)
//! 3. write through the collection adapter for the entity type
//!
//! Adapter errors propagate unchanged and nothing is retried. A two-step
//! write that stops halfway surfaces as [`RecordError::PartialWrite`], which
//! carries the missing step for [`Trellis::repair`].
//!
//! # Entity Types
//!
//! | Entity | Mutator | Identity |
//! |---|---|---|
//! | sponsors, lectures, notifications, users | [`CategoryMutator`] | [`EntityKey`] |
//! | events | [`EventMutator`] | [`EntityKey`] |
//! | team members | [`RosterMutator`] | [`MemberKey`] |

mod asset;
pub mod category;
pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod repository;
pub mod roster;

/// Category plus id; the identity of every category-keyed record.
pub use trellis_collections::ProjectionKey as EntityKey;

pub use category::CategoryMutator;
pub use config::{CollectionsConfig, StoreBackend, StoreConfig, TrellisConfig};
pub use entity::{Change, EntitySpec, IdSource};
pub use error::{RecordError, RecordResult};
pub use events::EventMutator;
pub use repository::Trellis;
pub use roster::{MemberKey, RosterMutator, MEMBER_ID};

pub use trellis_collections::{Intent, PartialWrite, Projections};

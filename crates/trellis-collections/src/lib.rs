//! Collection adapters over the Trellis path store.
//!
//! The store only knows paths and nodes. This crate layers the two identity
//! schemes the admin data uses on top of it, plus the coordination needed
//! when one logical write spans two locations.
//!
//! # Modules
//!
//! - [`indexed`]: [`IndexedCollection`]: a `members` sequence whose
//!   identity is array position
//! - [`category`]: [`CategoryCollection`]: `category → id → record`
//! - [`projection`]: [`DualProjectionWriter`]: one entity written to a
//!   summary and a detail collection
//! - [`intent`]: [`IntentLog`]: optional record of in-flight two-step writes
//! - [`partial`]: [`PartialWrite`]: what landed and what did not
//! - [`version`]: [`VersionToken`]: content hash of a sequence read
//!
//! # Consistency
//!
//! Nothing here is transactional. Index operations read, modify and write
//! the whole sequence; a concurrent caller can overwrite another's change,
//! and any index held across a removal is stale. Category moves and
//! dual-projection writes are two ordered single-path writes; when only the
//! first lands the caller gets a [`PartialWrite`] describing the missing half.

pub mod category;
pub mod error;
pub mod indexed;
pub mod intent;
pub mod partial;
pub mod projection;
pub mod version;

pub use category::{CategoryCollection, CategoryMap};
pub use error::{CollectionError, CollectionResult};
pub use indexed::{IndexedCollection, IndexedSnapshot};
pub use intent::{Intent, IntentLog};
pub use partial::{PartialWrite, Step, StepAction, StepRole, TwoStepKind};
pub use projection::{DualProjectionWriter, ProjectionKey, Projections};
pub use version::VersionToken;

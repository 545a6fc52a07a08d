//! Error types for collection operations.

use thiserror::Error;
use trellis_store::StoreError;
use trellis_types::{DocPath, RecordId, TypeError};

use crate::partial::PartialWrite;
use crate::version::VersionToken;

/// Errors that can occur during collection operations.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// No record at the requested index, id or category.
    #[error("not found: {path}")]
    NotFound { path: DocPath },

    /// The underlying store call failed; nothing was written by this step.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The first half of a two-step write landed and the second did not.
    #[error(transparent)]
    PartialWrite(Box<PartialWrite>),

    /// A checked index operation found the sequence changed since it was read.
    #[error("concurrent modification of {path}: read version {expected}, found {found}")]
    ConcurrentModification {
        path: DocPath,
        expected: VersionToken,
        found: VersionToken,
    },

    /// A recorded intent cannot be replayed: `path` was written after the
    /// operation stopped.
    #[error("intent {id} is stale: {path} changed after the write was recorded")]
    StaleIntent { id: RecordId, path: DocPath },

    /// A category or id is not a valid path segment.
    #[error("invalid key: {0}")]
    InvalidKey(#[from] TypeError),

    /// The node exists but does not have the collection's shape.
    #[error("malformed node at {path}: {reason}")]
    Malformed { path: DocPath, reason: String },
}

impl CollectionError {
    pub(crate) fn not_found(path: DocPath) -> Self {
        Self::NotFound { path }
    }

    pub(crate) fn malformed(path: &DocPath, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The partial-write details, if this is a partial write.
    pub fn as_partial_write(&self) -> Option<&PartialWrite> {
        match self {
            Self::PartialWrite(partial) => Some(partial),
            _ => None,
        }
    }
}

impl From<PartialWrite> for CollectionError {
    fn from(partial: PartialWrite) -> Self {
        Self::PartialWrite(Box::new(partial))
    }
}

/// Convenience type alias for collection operations.
pub type CollectionResult<T> = std::result::Result<T, CollectionError>;

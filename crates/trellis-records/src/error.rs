//! Error taxonomy surfaced by record mutators.

use thiserror::Error;
use trellis_assets::AssetError;
use trellis_collections::{CollectionError, PartialWrite, VersionToken};
use trellis_store::StoreError;
use trellis_types::{DocPath, RecordId, TypeError};

/// Errors returned by mutators and the [`Trellis`](crate::Trellis) facade.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The store could not be reached or refused access.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// The store rejected the call for a reason other than availability.
    #[error(transparent)]
    Store(StoreError),

    #[error("not found: {0}")]
    NotFound(String),

    /// Nothing was written: the upload failed before any store call.
    #[error("asset upload failed: {0}")]
    AssetUploadFailed(#[from] AssetError),

    /// The first half of a two-step write landed and the second did not.
    #[error(transparent)]
    PartialWrite(Box<PartialWrite>),

    /// Only one projection of a dual-projection entity exists. Repair or
    /// replay the interrupted write before changing it.
    #[error("split projection: {0} has only one of its projections; repair or replay the interrupted write first")]
    SplitProjection(String),

    /// An interrupted write cannot be replayed because `path` has changed
    /// since; inspect it and discard the intent.
    #[error("intent {id} is stale: {path} changed after the write was recorded; inspect it and discard the intent")]
    StaleIntent { id: RecordId, path: DocPath },

    #[error("concurrent modification of {path}: read version {expected}, found {found}")]
    ConcurrentModification {
        path: DocPath,
        expected: VersionToken,
        found: VersionToken,
    },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Stored data does not have the shape the collection expects.
    #[error("malformed data at {path}: {reason}")]
    Malformed { path: DocPath, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl RecordError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRecord(reason.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_partial_write(&self) -> bool {
        matches!(self, Self::PartialWrite(_))
    }

    pub fn as_partial_write(&self) -> Option<&PartialWrite> {
        match self {
            Self::PartialWrite(partial) => Some(partial),
            _ => None,
        }
    }
}

impl From<StoreError> for RecordError {
    fn from(e: StoreError) -> Self {
        if e.is_unavailable() {
            Self::StoreUnavailable(e)
        } else {
            Self::Store(e)
        }
    }
}

impl From<TypeError> for RecordError {
    fn from(e: TypeError) -> Self {
        Self::InvalidRecord(e.to_string())
    }
}

impl From<CollectionError> for RecordError {
    fn from(e: CollectionError) -> Self {
        match e {
            CollectionError::NotFound { path } => Self::NotFound(path.to_string()),
            CollectionError::Store(e) => e.into(),
            CollectionError::PartialWrite(partial) => Self::PartialWrite(partial),
            CollectionError::ConcurrentModification {
                path,
                expected,
                found,
            } => Self::ConcurrentModification {
                path,
                expected,
                found,
            },
            CollectionError::StaleIntent { id, path } => Self::StaleIntent { id, path },
            CollectionError::InvalidKey(e) => Self::InvalidRecord(e.to_string()),
            CollectionError::Malformed { path, reason } => Self::Malformed { path, reason },
        }
    }
}

pub type RecordResult<T> = Result<T, RecordError>;

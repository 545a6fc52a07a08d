use trellis_types::{DocPath, TypeError};

/// Errors from path store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connectivity or permission failure talking to the backend.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The path is malformed or names a location that cannot be written.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] TypeError),

    /// The write does not fit the shape of the existing tree (e.g. it passes
    /// through a scalar or addresses a missing sequence element).
    #[error("shape conflict at {path}: {reason}")]
    ShapeConflict { path: DocPath, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub(crate) fn conflict(path: &DocPath, reason: impl Into<String>) -> Self {
        Self::ShapeConflict {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for transport, permission and I/O failures.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

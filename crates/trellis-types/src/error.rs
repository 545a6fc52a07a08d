use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid record id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("invalid asset payload: {0}")]
    InvalidAsset(String),
}

use thiserror::Error;

/// Errors from asset uploads.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("uploader not configured: {0}")]
    NotConfigured(String),

    #[error("empty asset payload")]
    EmptyPayload,

    #[error("upload transport error: {0}")]
    Transport(String),

    #[error("upload rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected upload response: {0}")]
    InvalidResponse(String),
}

pub type AssetResult<T> = Result<T, AssetError>;

//! Asset uploads for Trellis.
//!
//! Images attached to records are not stored in the document tree. They are
//! sent to an external hosting service, and the record keeps the returned
//! URL. The contract is small: one payload in, `{url, thumbnail_url}` out, or
//! an error. One attempt per call, no retry, and no deletion of previously
//! uploaded assets.
//!
//! - [`HttpAssetUploader`] -- multipart POST to an imgbb-style endpoint
//! - [`StubUploader`] -- deterministic in-process uploader for tests and
//!   offline runs

pub mod config;
pub mod error;
pub mod http;
pub mod stub;
pub mod traits;

pub use config::UploaderConfig;
pub use error::{AssetError, AssetResult};
pub use http::{parse_upload_response, HttpAssetUploader};
pub use stub::StubUploader;
pub use traits::{AssetUploader, UploadedAsset};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use trellis_types::AssetPayload;

use crate::error::AssetResult;

/// Public locations of an uploaded asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    pub url: String,
    pub thumbnail_url: String,
}

/// External asset host.
///
/// Implementations make exactly one attempt per call. Size and content-type
/// checks are left to the remote service.
#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload(&self, payload: &AssetPayload) -> AssetResult<UploadedAsset>;
}

#[async_trait]
impl<U: AssetUploader + ?Sized> AssetUploader for Arc<U> {
    async fn upload(&self, payload: &AssetPayload) -> AssetResult<UploadedAsset> {
        (**self).upload(payload).await
    }
}

//! Deterministic in-process uploader.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use trellis_types::AssetPayload;

use crate::error::{AssetError, AssetResult};
use crate::traits::{AssetUploader, UploadedAsset};

/// Uploader that never leaves the process.
///
/// Returns `{base}/asset-{n}.bin` and `{base}/asset-{n}.thumb.bin` for the
/// n-th successful upload, or a `Rejected` error while failing is switched
/// on. Every call is counted, failed or not.
#[derive(Debug)]
pub struct StubUploader {
    base_url: String,
    calls: AtomicUsize,
    uploaded: AtomicUsize,
    failing: AtomicBool,
}

impl StubUploader {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            calls: AtomicUsize::new(0),
            uploaded: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// A stub whose every upload fails.
    pub fn failing() -> Self {
        let stub = Self::default();
        stub.set_failing(true);
        stub
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of upload calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of uploads that succeeded.
    pub fn uploaded(&self) -> usize {
        self.uploaded.load(Ordering::SeqCst)
    }
}

impl Default for StubUploader {
    fn default() -> Self {
        Self::new("https://assets.invalid")
    }
}

#[async_trait]
impl AssetUploader for StubUploader {
    async fn upload(&self, payload: &AssetPayload) -> AssetResult<UploadedAsset> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if payload.is_empty() {
            return Err(AssetError::EmptyPayload);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AssetError::Rejected {
                status: 503,
                message: "stub uploader is failing".into(),
            });
        }
        let n = self.uploaded.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(UploadedAsset {
            url: format!("{}/asset-{n}.bin", self.base_url),
            thumbnail_url: format!("{}/asset-{n}.thumb.bin", self.base_url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn numbers_successful_uploads() {
        let stub = StubUploader::new("https://cdn.test/");
        let first = stub.upload(&AssetPayload::from(b"a".to_vec())).await.unwrap();
        let second = stub.upload(&AssetPayload::from(b"b".to_vec())).await.unwrap();
        assert_eq!(first.url, "https://cdn.test/asset-1.bin");
        assert_eq!(second.thumbnail_url, "https://cdn.test/asset-2.thumb.bin");
        assert_eq!(stub.calls(), 2);
    }

    #[tokio::test]
    async fn failing_stub_counts_calls_but_uploads_nothing() {
        let stub = StubUploader::failing();
        let err = stub.upload(&AssetPayload::from(b"a".to_vec())).await.unwrap_err();
        assert!(matches!(err, AssetError::Rejected { status: 503, .. }));
        assert_eq!((stub.calls(), stub.uploaded()), (1, 0));

        stub.set_failing(false);
        stub.upload(&AssetPayload::from(b"a".to_vec())).await.unwrap();
        assert_eq!(stub.uploaded(), 1);
    }
}

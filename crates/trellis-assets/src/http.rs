//! HTTP uploader for imgbb-style image hosts.
//!
//! Request: `POST {endpoint}?key={api_key}` with a multipart form whose
//! `image` field holds the base64 payload.
//!
//! Response:
//!
//! ```text
//! success: {"success": true,  "data": {"image": {"url": ...}, "thumb": {"url": ...}}}
//! failure: {"success": false, "status": 400, "error": {"message": ...}}
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use trellis_types::AssetPayload;

use crate::config::UploaderConfig;
use crate::error::{AssetError, AssetResult};
use crate::traits::{AssetUploader, UploadedAsset};

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    data: Option<EnvelopeData>,
    error: Option<EnvelopeError>,
}

#[derive(Deserialize)]
struct EnvelopeData {
    image: Option<Link>,
    thumb: Option<Link>,
    url: Option<String>,
}

#[derive(Deserialize)]
struct Link {
    url: String,
}

#[derive(Deserialize)]
struct EnvelopeError {
    message: Option<String>,
}

/// Interpret an upload response body.
pub fn parse_upload_response(status: u16, body: &[u8]) -> AssetResult<UploadedAsset> {
    let ok_status = (200..300).contains(&status);
    let envelope: Envelope = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) if ok_status => {
            return Err(AssetError::InvalidResponse(format!("body is not an upload envelope: {e}")))
        }
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            return Err(AssetError::Rejected {
                status,
                message: text.chars().take(200).collect(),
            });
        }
    };

    if !ok_status || !envelope.success {
        let message = envelope
            .error
            .and_then(|e| e.message)
            .unwrap_or_else(|| "upload failed".to_string());
        return Err(AssetError::Rejected { status, message });
    }

    let data = envelope
        .data
        .ok_or_else(|| AssetError::InvalidResponse("missing data".into()))?;
    let url = data
        .image
        .map(|link| link.url)
        .or(data.url)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| AssetError::InvalidResponse("missing image url".into()))?;
    let thumbnail_url = data.thumb.map(|link| link.url).unwrap_or_else(|| url.clone());
    Ok(UploadedAsset { url, thumbnail_url })
}

/// Uploader backed by one HTTP call per asset.
pub struct HttpAssetUploader {
    config: UploaderConfig,
    client: reqwest::Client,
}

impl HttpAssetUploader {
    pub fn new(config: UploaderConfig) -> AssetResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AssetError::NotConfigured(format!("http client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Use a caller-built client (custom TLS, proxies, test servers).
    pub fn with_client(config: UploaderConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }
}

#[async_trait]
impl AssetUploader for HttpAssetUploader {
    async fn upload(&self, payload: &AssetPayload) -> AssetResult<UploadedAsset> {
        if payload.is_empty() {
            return Err(AssetError::EmptyPayload);
        }
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AssetError::NotConfigured("missing upload API key".into()))?;

        let form = reqwest::multipart::Form::new().text("image", payload.to_base64());
        let response = self
            .client
            .post(&self.config.endpoint)
            .query(&[("key", key)])
            .multipart(form)
            .send()
            .await
            .map_err(|e| AssetError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| AssetError::Transport(format!("read body failed: {e}")))?;

        match parse_upload_response(status, &body) {
            Ok(asset) => {
                debug!(status, bytes = payload.len(), url = %asset.url, "asset uploaded");
                Ok(asset)
            }
            Err(e) => {
                warn!(status, error = %e, "asset upload failed");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for HttpAssetUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAssetUploader")
            .field("config", &self.config)
            .finish()
    }
}

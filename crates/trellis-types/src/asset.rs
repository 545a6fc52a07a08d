//! Asset references: binary payloads awaiting upload, or resolved URLs.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

use crate::error::TypeError;
use crate::node::Node;

/// Raw asset content pending upload.
#[derive(Clone, PartialEq, Eq)]
pub enum AssetPayload {
    /// Raw bytes (e.g. read from a file).
    Bytes(Bytes),
    /// Base64 text, without any `data:` URI prefix.
    Base64(String),
}

impl AssetPayload {
    /// Build a payload from a `data:<mime>;base64,<data>` URI or bare base64.
    pub fn from_data_uri(s: &str) -> Result<Self, TypeError> {
        let data = match s.strip_prefix("data:") {
            Some(rest) => {
                let (_, data) = rest.split_once(',').ok_or_else(|| {
                    TypeError::InvalidAsset("data URI has no ',' separator".into())
                })?;
                data
            }
            None => s,
        };
        let data = data.trim();
        if data.is_empty() {
            return Err(TypeError::InvalidAsset("empty payload".into()));
        }
        STANDARD
            .decode(data)
            .map_err(|e| TypeError::InvalidAsset(format!("payload is not base64: {e}")))?;
        Ok(Self::Base64(data.to_string()))
    }

    /// The payload as base64 text.
    pub fn to_base64(&self) -> String {
        match self {
            Self::Bytes(bytes) => STANDARD.encode(bytes),
            Self::Base64(text) => text.clone(),
        }
    }

    /// Size of the payload as it would be sent, in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Bytes(bytes) => bytes.len(),
            Self::Base64(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for AssetPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl fmt::Debug for AssetPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => write!(f, "AssetPayload::Bytes({} bytes)", b.len()),
            Self::Base64(t) => write!(f, "AssetPayload::Base64({} chars)", t.len()),
        }
    }
}

/// The state of an asset field on a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetRef {
    /// Content that still has to go through the uploader.
    Pending(AssetPayload),
    /// A public URL returned by a previous upload.
    Resolved(String),
}

impl AssetRef {
    /// Classify the value of an asset field.
    ///
    /// `http(s)://` strings are resolved URLs. Other strings must be valid
    /// base64, optionally wrapped in a `data:` URI, to count as a payload.
    /// Anything else yields `None`: absent, null, empty and non-string values,
    /// and text that is neither a URL nor base64.
    pub fn classify(value: Option<&Node>) -> Option<Self> {
        let text = value?.as_str()?.trim();
        if text.is_empty() {
            return None;
        }
        if text.starts_with("https://") || text.starts_with("http://") {
            return Some(Self::Resolved(text.to_string()));
        }
        AssetPayload::from_data_uri(text).ok().map(Self::Pending)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default image-hosting endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.imgbb.com/1/upload";

/// Configuration for the [`HttpAssetUploader`](crate::HttpAssetUploader).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    /// Upload endpoint URL.
    pub endpoint: String,
    /// API key sent with every upload. Uploads fail without one.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl UploaderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl std::fmt::Debug for UploaderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploaderConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = UploaderConfig::default();
        assert_eq!(c.endpoint, DEFAULT_ENDPOINT);
        assert!(c.api_key.is_none());
        assert_eq!(c.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn debug_redacts_key() {
        let c = UploaderConfig {
            api_key: Some("sekrit".into()),
            ..Default::default()
        };
        let debug = format!("{c:?}");
        assert!(!debug.contains("sekrit"));
        assert!(debug.contains("<redacted>"));
    }
}

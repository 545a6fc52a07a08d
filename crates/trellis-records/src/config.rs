//! Workspace configuration: loaded once at start, immutable afterwards.
//!
//! ```toml
//! [store]
//! backend = "file"
//! path = "data/trellis.json"
//!
//! [uploader]
//! endpoint = "https://api.imgbb.com/1/upload"
//! timeout_secs = 30
//!
//! [collections]
//! event_details = "eventDetails"
//! intent_log = true
//! ```
//!
//! Secrets belong in the environment: `TRELLIS_UPLOAD_API_KEY` overrides
//! `uploader.api_key` and `TRELLIS_STORE_PATH` overrides `store.path`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use trellis_assets::UploaderConfig;
use trellis_store::FileStoreConfig;
use trellis_types::DocPath;

use crate::error::{RecordError, RecordResult};

pub const ENV_UPLOAD_API_KEY: &str = "TRELLIS_UPLOAD_API_KEY";
pub const ENV_STORE_PATH: &str = "TRELLIS_STORE_PATH";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local tree, lost on exit.
    Memory,
    /// One JSON document on disk.
    #[default]
    File,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
    pub pretty: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let file = FileStoreConfig::default();
        Self {
            backend: StoreBackend::File,
            path: file.path,
            pretty: true,
        }
    }
}

impl StoreConfig {
    pub fn file_config(&self) -> FileStoreConfig {
        FileStoreConfig {
            path: self.path.clone(),
            pretty: self.pretty,
        }
    }
}

/// Top-level collection roots in the document tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionsConfig {
    pub sponsors: String,
    pub lectures: String,
    pub notifications: String,
    pub users: String,
    pub events: String,
    pub event_details: String,
    pub teams: String,
    pub intents: String,
    /// Journal two-step writes under `intents` while they are in flight.
    pub intent_log: bool,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            sponsors: "sponsors".into(),
            lectures: "lectures".into(),
            notifications: "notifications".into(),
            users: "users".into(),
            events: "events".into(),
            event_details: "eventDetails".into(),
            teams: "teams".into(),
            intents: "_intents".into(),
            intent_log: false,
        }
    }
}

impl CollectionsConfig {
    /// Parse a configured root, rejecting the tree root itself.
    pub fn root(value: &str) -> RecordResult<DocPath> {
        let path = DocPath::parse(value)
            .map_err(|e| RecordError::Config(format!("collection root {value:?}: {e}")))?;
        if path.is_root() {
            return Err(RecordError::Config("collection root must not be empty".into()));
        }
        Ok(path)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrellisConfig {
    pub store: StoreConfig,
    pub uploader: UploaderConfig,
    pub collections: CollectionsConfig,
}

impl TrellisConfig {
    pub fn from_toml_str(s: &str) -> RecordResult<Self> {
        toml::from_str(s).map_err(|e| RecordError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> RecordResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RecordError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Apply `TRELLIS_*` environment overrides.
    pub fn with_env(self) -> Self {
        self.overlay(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; empty values are ignored.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(key) = lookup(ENV_UPLOAD_API_KEY) {
            self.uploader.api_key = Some(key);
        }
        if let Some(path) = lookup(ENV_STORE_PATH) {
            self.store.backend = StoreBackend::File;
            self.store.path = PathBuf::from(path);
        }
        self
    }

    /// Render as TOML with the API key masked.
    pub fn to_redacted_toml(&self) -> RecordResult<String> {
        let mut shown = self.clone();
        if shown.uploader.api_key.is_some() {
            shown.uploader.api_key = Some("<redacted>".into());
        }
        toml::to_string_pretty(&shown).map_err(|e| RecordError::Config(e.to_string()))
    }
}

//! JSON-file backend: the whole tree as one document on disk.
//!
//! Every mutating call loads the document, applies the change, and writes the
//! result to a temporary file in the same directory before renaming it over
//! the original. A crash mid-write leaves the previous document intact.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use trellis_types::{DocPath, Node, WriteMode};

use crate::error::{StoreError, StoreResult};
use crate::traits::PathStore;
use crate::tree;

/// Configuration for the [`JsonFileStore`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileStoreConfig {
    /// Location of the JSON document.
    pub path: PathBuf,
    /// Pretty-print the document on write.
    #[serde(default)]
    pub pretty: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("trellis.json"),
            pretty: false,
        }
    }
}

/// Document store persisted as a single JSON file.
///
/// Calls on one instance are serialized by an async mutex. Two processes
/// sharing the same file are not coordinated.
pub struct JsonFileStore {
    config: FileStoreConfig,
    gate: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(config: FileStoreConfig) -> Self {
        Self {
            config,
            gate: Mutex::new(()),
        }
    }

    /// Shorthand for a compact store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(FileStoreConfig {
            path: path.into(),
            pretty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    async fn load(&self) -> StoreResult<Node> {
        match tokio::fs::read(&self.config.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(tree::empty_tree()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StoreError::Serialization(format!(
                    "{} is not a valid document: {e}",
                    self.config.path.display()
                ))
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(tree::empty_tree()),
            Err(e) => Err(unavailable(&self.config.path, e)),
        }
    }

    async fn persist(&self, root: &Node) -> StoreResult<()> {
        let bytes = if self.config.pretty {
            serde_json::to_vec_pretty(root)
        } else {
            serde_json::to_vec(root)
        }
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let path = self.config.path.clone();
        let len = bytes.len();
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|e| StoreError::Unavailable(format!("writer task failed: {e}")))?
            .map_err(|e| unavailable(&self.config.path, e))?;
        debug!(path = %self.config.path.display(), bytes = len, "document persisted");
        Ok(())
    }
}

fn unavailable(path: &Path, e: io::Error) -> StoreError {
    match e.kind() {
        io::ErrorKind::PermissionDenied => {
            StoreError::Unavailable(format!("permission denied: {}", path.display()))
        }
        _ => StoreError::Io(e),
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl PathStore for JsonFileStore {
    async fn read(&self, path: &DocPath) -> StoreResult<Option<Node>> {
        let _guard = self.gate.lock().await;
        let root = self.load().await?;
        Ok(tree::get(&root, path).cloned())
    }

    async fn write(&self, path: &DocPath, node: Node, mode: WriteMode) -> StoreResult<()> {
        let _guard = self.gate.lock().await;
        let mut root = self.load().await?;
        tree::put(&mut root, path, node, mode)?;
        self.persist(&root).await
    }

    async fn delete(&self, path: &DocPath) -> StoreResult<()> {
        let _guard = self.gate.lock().await;
        let mut root = self.load().await?;
        if tree::remove(&mut root, path)? {
            self.persist(&root).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for JsonFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileStore")
            .field("path", &self.config.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> DocPath {
        DocPath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("db.json"));
        assert!(store.read(&p("sponsors")).await.unwrap().is_none());
        store.delete(&p("sponsors/gold/x")).await.unwrap();
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested/db.json");
        {
            let store = JsonFileStore::open(&file);
            store
                .write(&p("lectures/ai/l1"), json!({"title": "Intro", "speaker": "Ada"}), WriteMode::Replace)
                .await
                .unwrap();
            store
                .write(&p("lectures/ai/l1"), json!({"room": "B2"}), WriteMode::Merge)
                .await
                .unwrap();
        }
        let reopened = JsonFileStore::open(&file);
        let lecture = reopened.read(&p("lectures/ai/l1")).await.unwrap().unwrap();
        assert_eq!(lecture, json!({"title": "Intro", "speaker": "Ada", "room": "B2"}));
    }

    #[tokio::test]
    async fn delete_prunes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("db.json");
        let store = JsonFileStore::new(FileStoreConfig { path: file.clone(), pretty: true });
        store.write(&p("users/admin/u1"), json!({"name": "root"}), WriteMode::Replace).await.unwrap();
        store.delete(&p("users/admin/u1")).await.unwrap();

        let raw = std::fs::read_to_string(&file).unwrap();
        let doc: Node = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc, json!({}));
    }

    #[tokio::test]
    async fn corrupt_document_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("db.json");
        std::fs::write(&file, b"{not json").unwrap();
        let store = JsonFileStore::open(&file);
        let err = store.read(&p("a")).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[tokio::test]
    async fn rejected_write_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("db.json");
        let store = JsonFileStore::open(&file);
        store.write(&p("flag"), json!(true), WriteMode::Replace).await.unwrap();
        let before = std::fs::read(&file).unwrap();
        assert!(store.write(&p("flag/x"), json!(1), WriteMode::Replace).await.is_err());
        assert_eq!(std::fs::read(&file).unwrap(), before);
    }
}

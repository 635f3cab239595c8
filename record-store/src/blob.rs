//! Blob storage for uploaded files.
//!
//! The location handle returned by `put` is opaque to callers; it is stored
//! inside a `FileAttachment` and never parsed. A blob write and the record
//! write that references it are not atomic: a failed metadata write can
//! leave an orphaned blob behind, which is accepted.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

#[derive(thiserror::Error, Debug)]
pub enum BlobError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores the bytes and returns an opaque location handle.
    async fn put(&self, object_key: &str, bytes: &[u8]) -> Result<String, BlobError>;

    async fn get(&self, object_key: &str) -> Result<Vec<u8>, BlobError>;
}

/// Blob store rooted at a local directory. Object keys map to relative
/// paths below the root; traversal components are rejected.
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FilesystemBlobStore { root: root.into() }
    }

    fn object_path(&self, object_key: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(object_key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || object_key.is_empty() {
            return Err(BlobError::InvalidKey(object_key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, object_key: &str, bytes: &[u8]) -> Result<String, BlobError> {
        let path = self.object_path(object_key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(format!("file://{}", path.display()))
    }

    async fn get(&self, object_key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.object_path(object_key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(object_key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process blob store for tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, object_key: &str, bytes: &[u8]) -> Result<String, BlobError> {
        let mut objects = self
            .objects
            .write()
            .map_err(|e| BlobError::InvalidKey(e.to_string()))?;
        objects.insert(object_key.to_string(), bytes.to_vec());
        Ok(format!("mem://{object_key}"))
    }

    async fn get(&self, object_key: &str) -> Result<Vec<u8>, BlobError> {
        let objects = self
            .objects
            .read()
            .map_err(|e| BlobError::InvalidKey(e.to_string()))?;
        objects
            .get(object_key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(object_key.to_string()))
    }
}

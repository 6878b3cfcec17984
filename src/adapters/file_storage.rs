//! File storage for submission uploads.
//!
//! A thin port over `object_store`: the pipeline only needs "store a blob,
//! get back a retrievable reference". The backend is optional; when absent
//! the pipeline skips uploads with a warning instead of failing submissions.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use uuid::Uuid;

pub type FileStorageResult<T> = Result<T, FileStorageError>;

#[derive(Debug, thiserror::Error)]
pub enum FileStorageError {
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Invalid storage path: {0}")]
    Path(#[from] object_store::path::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Accepts a blob and returns a retrievable reference to it.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn put(&self, filename: &str, content: Bytes) -> FileStorageResult<String>;
}

/// Local-filesystem backend.
pub struct LocalFileStorage {
    store: Arc<dyn ObjectStore>,
}

impl LocalFileStorage {
    pub fn new(root: &Path) -> FileStorageResult<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            store: Arc::new(LocalFileSystem::new_with_prefix(root)?),
        })
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn put(&self, filename: &str, content: Bytes) -> FileStorageResult<String> {
        // Prefix with a UUID so colliding upload names never overwrite.
        let location = ObjectPath::parse(format!("{}-{}", Uuid::new_v4(), sanitize(filename)))?;
        self.store
            .put(&location, PutPayload::from(content))
            .await?;
        Ok(location.to_string())
    }
}

fn sanitize(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

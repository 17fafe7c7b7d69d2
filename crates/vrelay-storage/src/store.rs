//! Storage collaborator seam.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use vrelay_models::{ObjectInfo, SearchQuery};

use crate::error::{StorageError, StorageResult};

/// A place source media can be resolved and fetched from.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Look up metadata for a caller-supplied reference.
    ///
    /// The returned `id` parses back to the same backend.
    async fn resolve(&self, reference: &str) -> StorageResult<ObjectInfo>;

    /// Download a resolved object into `dir`, returning the local path.
    async fn fetch(&self, info: &ObjectInfo, dir: &Path) -> StorageResult<PathBuf>;

    /// Search the backend for video objects.
    async fn search(&self, _query: &SearchQuery) -> StorageResult<Vec<ObjectInfo>> {
        Err(StorageError::Unsupported("search".to_string()))
    }
}

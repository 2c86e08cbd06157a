//! External binary storage behind a trait (SPEC_FULL.md §4.B).
//!
//! `LocalBlobStore` is the only implementation this core ships: a development/self-hosted
//! filesystem backend under a configured root directory, following the teacher's own
//! `tokio::fs`-based file handling (see `cli/init.rs`). A production deployment swaps in an
//! S3-compatible implementation of the same trait without touching the Ingestor.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::types::{CoreError, Result};

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `bytes` under `{tenant}/{relative_path}` and returns a durable `blob_url`.
    async fn put(&self, tenant: &str, relative_path: &str, bytes: &[u8]) -> Result<String>;

    /// Resolves a previously returned `blob_url` (or the path within it) to a fetchable URL.
    fn get_url(&self, blob_id: &str) -> String;

    async fn delete(&self, blob_id: &str) -> Result<()>;
}

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, blob_id: &str) -> PathBuf {
        self.root.join(blob_id)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, tenant: &str, relative_path: &str, bytes: &[u8]) -> Result<String> {
        let blob_id = format!("{tenant}/{relative_path}");
        let path = self.resolve(&blob_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(transient)?;
        }
        fs::write(&path, bytes).await.map_err(transient)?;
        Ok(format!("file://{}", path.display()))
    }

    fn get_url(&self, blob_id: &str) -> String {
        format!("file://{}", self.resolve(blob_id).display())
    }

    async fn delete(&self, blob_id: &str) -> Result<()> {
        let path = self.resolve(blob_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(transient(e)),
        }
    }
}

fn transient(e: impl std::fmt::Display) -> CoreError {
    CoreError::TransientUpstream(e.to_string())
}

/// Lowercases an email and replaces non-alphanumeric characters with `_`, for use as the leading
/// path segment of a blob's `relative_path` (SPEC_FULL.md §4.H).
pub fn sanitize_tenant(email: &str) -> String {
    email
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

//! Local filesystem storage implementation.
//!
//! Used for development and single-host deployments. Production deployments
//! should use S3Storage.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── {archive_key}             # Current snapshot
//! ├── {historical_key}          # Dated snapshots
//! └── test/                     # Same layout, used in test mode
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Snapshot;
use crate::storage::SnapshotStore;
use crate::utils::content_hash;

/// Prefix applied to every key in test mode.
const TEST_PREFIX: &str = "test";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Create a LocalStorage whose keys all live under `test/`.
    pub fn for_tests(root_dir: impl Into<PathBuf>) -> Self {
        Self::new(root_dir.into().join(TEST_PREFIX))
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl SnapshotStore for LocalStorage {
    async fn stored_hash(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .read_bytes(key)
            .await?
            .map(|bytes| content_hash(&bytes)))
    }

    async fn write_current(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        self.write_bytes(key, snapshot.payload.as_bytes()).await?;
        log::info!("Current snapshot written to {}", self.location(key));
        Ok(())
    }

    async fn write_historical(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        self.write_bytes(key, snapshot.payload.as_bytes()).await?;
        log::info!("Historical snapshot written to {}", self.location(key));
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.read_bytes(key).await
    }

    fn location(&self, key: &str) -> String {
        self.path(key).display().to_string()
    }
}

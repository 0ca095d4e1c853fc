//! Local filesystem blob store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{BlobStore, StorageError, StorageResult, blob_key};

/// Blob store rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    /// Create the store, creating `base_path` if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Config` if the directory cannot be created.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::Config(format!(
                "Failed to create storage directory {}: {e}",
                base_path.display()
            ))
        })?;
        Ok(Self { base_path })
    }

    /// Convert a key to a path inside the base directory.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.contains("..") || key.starts_with('/') || key.contains('\\') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }
        Ok(self.base_path.join(key))
    }

    async fn ensure_parent_dir(path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn write(&self, namespace: &str, extension: &str, data: &[u8]) -> StorageResult<String> {
        let key = blob_key(namespace, extension, data)?;
        let path = self.key_to_path(&key)?;

        if fs::try_exists(&path).await? {
            tracing::debug!(key = %key, "Blob already stored");
            return Ok(key);
        }
        Self::ensure_parent_dir(&path).await?;

        // Write to a temporary name first so readers never see a partial blob.
        let tmp = path.with_extension(format!("{extension}.tmp"));
        let mut file = fs::File::create(&tmp).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create file {}: {e}", tmp.display()))
        })?;
        file.write_all(data).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to write file {}: {e}", tmp.display()))
        })?;
        file.sync_all().await?;
        fs::rename(&tmp, &path).await?;

        tracing::info!(key = %key, size = data.len(), "Blob stored");
        Ok(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::SIGNATURES;

    #[tokio::test]
    async fn test_write_is_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().join("uploads")).await.unwrap();

        let key = store.write(SIGNATURES, "png", b"signature").await.unwrap();
        let path = dir.path().join("uploads").join(&key);
        assert_eq!(std::fs::read(&path).unwrap(), b"signature");
        assert!(!path.with_extension("png.tmp").exists());

        // Rewriting identical content yields the same key.
        assert_eq!(store.write(SIGNATURES, "png", b"signature").await.unwrap(), key);
    }

    #[tokio::test]
    async fn test_keys_stay_inside_base() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();

        assert!(matches!(
            store.key_to_path("../secret"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.key_to_path("/etc/passwd"),
            Err(StorageError::InvalidKey(_))
        ));
        assert_eq!(
            store.key_to_path("photos/a.png").unwrap(),
            dir.path().join("photos/a.png")
        );
    }
}

//! In-memory blob store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{BlobStore, StorageResult, blob_key};

/// Blob store held in process memory. Cloning shares the contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn write(&self, namespace: &str, extension: &str, data: &[u8]) -> StorageResult<String> {
        let key = blob_key(namespace, extension, data)?;
        self.blobs
            .lock()
            .await
            .entry(key.clone())
            .or_insert_with(|| data.to_vec());
        Ok(key)
    }
}

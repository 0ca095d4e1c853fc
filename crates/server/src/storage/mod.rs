//! Blob storage for invoice files, delivery photos and signatures.
//!
//! Blobs are content addressed: the key of a blob is
//! `{namespace}/{sha256}.{extension}`, so rewriting identical bytes is a
//! no-op and a retried confirmation never leaves duplicate files behind.

pub mod local;
pub mod memory;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

/// Namespace for driver signatures.
pub const SIGNATURES: &str = "signatures";
/// Namespace for delivery photos.
pub const PHOTOS: &str = "photos";
/// Namespace for uploaded invoice documents.
pub const INVOICES: &str = "invoices";

/// Blob storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Binary blob storage backend.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` and return its key.
    async fn write(&self, namespace: &str, extension: &str, data: &[u8]) -> StorageResult<String>;
}

/// Compute the content-addressed key for a blob.
///
/// # Errors
///
/// Returns `StorageError::InvalidKey` if the namespace or extension contain
/// anything but lowercase ASCII letters, digits, `-` or `_`.
pub fn blob_key(namespace: &str, extension: &str, data: &[u8]) -> StorageResult<String> {
    validate_segment(namespace)?;
    validate_segment(extension)?;
    let digest = hex::encode(Sha256::digest(data));
    Ok(format!("{namespace}/{digest}.{extension}"))
}

fn validate_segment(segment: &str) -> StorageResult<()> {
    let valid = !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(format!("invalid key segment '{segment}'")))
    }
}

/// Lowercased extension of an uploaded file name, if it is usable as a key segment.
#[must_use]
pub fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    validate_segment(&ext).ok().map(|()| ext)
}

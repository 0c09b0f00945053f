//! Blob store abstraction trait
//!
//! The pipeline only ever streams bytes in and round-trips the returned id;
//! everything else about a backend stays behind this trait.

use crate::StorageBackend;
use async_trait::async_trait;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob id: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Streaming blob store.
///
/// Ids are assigned by the store at upload time. A blob becomes visible under
/// its id only after the body was read to EOF without error; a failed read
/// leaves nothing behind.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Assign a fresh id and stream `body` into it until EOF.
    ///
    /// Returns the assigned id and the number of bytes stored.
    async fn assign_and_upload(
        &self,
        content_type: &str,
        body: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<(String, u64)>;

    /// Externally resolvable URL for a stored blob.
    async fn resolve_url(&self, id: &str) -> StorageResult<String>;

    /// Size in bytes of a stored blob.
    async fn content_length(&self, id: &str) -> StorageResult<u64>;

    async fn exists(&self, id: &str) -> StorageResult<bool>;

    /// Delete a blob. Deleting a missing id is not an error.
    async fn delete(&self, id: &str) -> StorageResult<()>;

    async fn download(&self, id: &str) -> StorageResult<Vec<u8>>;

    fn backend_type(&self) -> StorageBackend;
}

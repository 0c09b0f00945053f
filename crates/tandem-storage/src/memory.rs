use crate::keys::generate_blob_id;
use crate::traits::{BlobStore, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::RwLock;

#[derive(Clone)]
struct StoredBlob {
    content_type: String,
    data: Bytes,
}

/// Blob store kept in process memory. Used by tests and dry runs.
#[derive(Clone)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, StoredBlob>>>,
    base_url: String,
}

impl MemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            blobs: Arc::new(RwLock::new(HashMap::new())),
            base_url: base_url.into(),
        }
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    pub async fn content_type(&self, id: &str) -> Option<String> {
        self.blobs
            .read()
            .await
            .get(id)
            .map(|blob| blob.content_type.clone())
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://blobs")
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn assign_and_upload(
        &self,
        content_type: &str,
        mut body: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<(String, u64)> {
        let mut data = Vec::new();
        body.read_to_end(&mut data)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Failed to read body: {}", e)))?;

        let id = generate_blob_id(content_type);
        let size = data.len() as u64;
        self.blobs.write().await.insert(
            id.clone(),
            StoredBlob {
                content_type: content_type.to_string(),
                data: Bytes::from(data),
            },
        );

        tracing::debug!(id = %id, size_bytes = size, "Memory blob upload successful");
        Ok((id, size))
    }

    async fn resolve_url(&self, id: &str) -> StorageResult<String> {
        Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), id))
    }

    async fn content_length(&self, id: &str) -> StorageResult<u64> {
        self.blobs
            .read()
            .await
            .get(id)
            .map(|blob| blob.data.len() as u64)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        Ok(self.blobs.read().await.contains_key(id))
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        self.blobs.write().await.remove(id);
        Ok(())
    }

    async fn download(&self, id: &str) -> StorageResult<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(id)
            .map(|blob| blob.data.to_vec())
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

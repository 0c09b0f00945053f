use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tandem_core::{Artifact, Locator, PipelineError, PipelineResult};
use tandem_storage::BlobStore;
use tokio::io::AsyncRead;

/// Drains output streams into the blob store and resolves their locators.
///
/// Uploads are never retried; a failed stream is reported as `UploadFailure`
/// for its artifact and the record slot stays empty.
///
/// Clones share one list of committed blob ids, so a run that ends without a
/// record can delete everything it stored.
#[derive(Clone)]
pub struct UploadMultiplexer {
    store: Arc<dyn BlobStore>,
    committed: Arc<Mutex<Vec<String>>>,
}

impl UploadMultiplexer {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            committed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Ids of every blob stored through this multiplexer or its clones.
    pub fn committed_ids(&self) -> Vec<String> {
        self.committed().clone()
    }

    /// Delete every committed blob. Failures are logged and skipped.
    pub async fn discard_committed(&self) {
        let ids = std::mem::take(&mut *self.committed());
        for id in ids {
            match self.store.delete(&id).await {
                Ok(()) => tracing::debug!(id = %id, "Unreferenced blob deleted"),
                Err(e) => tracing::warn!(id = %id, error = %e, "Failed to delete unreferenced blob"),
            }
        }
    }

    fn committed(&self) -> MutexGuard<'_, Vec<String>> {
        self.committed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn upload<R>(
        &self,
        artifact: Artifact,
        content_type: &str,
        reader: R,
    ) -> PipelineResult<Locator>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let start = std::time::Instant::now();
        let failure = |reason: String| PipelineError::UploadFailure { artifact, reason };

        let (id, size) = self
            .store
            .assign_and_upload(content_type, Box::pin(reader))
            .await
            .map_err(|e| failure(e.to_string()))?;
        self.committed().push(id.clone());

        let url = self
            .store
            .resolve_url(&id)
            .await
            .map_err(|e| failure(e.to_string()))?;

        tracing::debug!(
            artifact = %artifact,
            id = %id,
            size_bytes = size,
            duration_ms = start.elapsed().as_millis(),
            "Artifact uploaded"
        );

        Ok(Locator {
            id,
            url,
            content_type: content_type.to_string(),
            size,
        })
    }

    pub async fn upload_bytes(
        &self,
        artifact: Artifact,
        content_type: &str,
        data: Bytes,
    ) -> PipelineResult<Locator> {
        self.upload(artifact, content_type, Cursor::new(data)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_storage::MemoryBlobStore;

    #[tokio::test]
    async fn test_upload_bytes_resolves_locator() {
        let store = Arc::new(MemoryBlobStore::default());
        let uploader = UploadMultiplexer::new(store.clone());

        let locator = uploader
            .upload_bytes(Artifact::ThumbnailJpeg, "image/jpeg", Bytes::from_static(b"jpeg"))
            .await
            .unwrap();

        assert_eq!(locator.size, 4);
        assert_eq!(locator.content_type, "image/jpeg");
        assert!(locator.url.ends_with(&locator.id));
        assert_eq!(store.content_length(&locator.id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_discard_committed_deletes_blobs_from_every_clone() {
        let store = Arc::new(MemoryBlobStore::default());
        let uploader = UploadMultiplexer::new(store.clone());
        let other = uploader.clone();

        let jpeg = uploader
            .upload_bytes(Artifact::ThumbnailJpeg, "image/jpeg", Bytes::from_static(b"jpeg"))
            .await
            .unwrap();
        let webp = other
            .upload_bytes(Artifact::ThumbnailWebp, "image/webp", Bytes::from_static(b"webp"))
            .await
            .unwrap();
        assert_eq!(uploader.committed_ids(), vec![jpeg.id.clone(), webp.id.clone()]);

        uploader.discard_committed().await;

        assert!(!store.exists(&jpeg.id).await.unwrap());
        assert!(!store.exists(&webp.id).await.unwrap());
        assert!(other.committed_ids().is_empty());
    }
}

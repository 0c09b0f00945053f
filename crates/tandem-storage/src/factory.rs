use crate::{BlobStore, LocalBlobStore, MemoryBlobStore, StorageBackend, StorageError, StorageResult};
use std::sync::Arc;
use tandem_core::StorageConfig;

/// Create a blob store based on configuration
pub async fn create_blob_store(config: &StorageConfig) -> StorageResult<Arc<dyn BlobStore>> {
    match config.backend {
        StorageBackend::Local => {
            let base_path = config.local_path.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = config.local_base_url.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_BASE_URL not configured".to_string())
            })?;

            let store = LocalBlobStore::new(base_path, base_url).await?;
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            let base_url = config
                .local_base_url
                .clone()
                .unwrap_or_else(|| "memory://blobs".to_string());
            Ok(Arc::new(MemoryBlobStore::new(base_url)))
        }
    }
}

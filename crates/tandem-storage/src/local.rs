use crate::keys::{generate_blob_id, validate_blob_id};
use crate::traits::{BlobStore, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tokio::io::AsyncRead;

/// Local filesystem blob store
#[derive(Clone)]
pub struct LocalBlobStore {
    base_path: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    /// Create a new LocalBlobStore instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for blobs (e.g., "/var/lib/tandem/blobs")
    /// * `base_url` - Base URL the blobs are served from (e.g., "http://localhost:3000/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalBlobStore {
            base_path,
            base_url,
        })
    }

    /// Convert a blob id to its filesystem path, rejecting anything that could
    /// escape the base directory.
    fn id_to_path(&self, id: &str) -> StorageResult<PathBuf> {
        if !validate_blob_id(id) {
            return Err(StorageError::InvalidKey(
                "Blob id contains invalid characters".to_string(),
            ));
        }
        Ok(self.base_path.join(id))
    }

    /// In-flight uploads are written here and renamed into place once complete.
    fn partial_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!(".{}.partial", id))
    }

    fn generate_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), id)
    }
}

/// An in-flight upload file. Removed on drop unless the upload was committed,
/// so an error, a cancelled future or a failed rename never leaves it behind.
struct PartialUpload {
    path: PathBuf,
    committed: bool,
}

impl PartialUpload {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// The file has been renamed into place.
    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialUpload {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Partial upload removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove partial upload"
            ),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn assign_and_upload(
        &self,
        content_type: &str,
        mut body: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<(String, u64)> {
        let id = generate_blob_id(content_type);
        let path = self.id_to_path(&id)?;
        let partial = PartialUpload::new(self.partial_path(&id));
        let start = std::time::Instant::now();

        let mut file = fs::File::create(partial.path()).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create file {}: {}",
                partial.path().display(),
                e
            ))
        })?;

        let bytes_copied = tokio::io::copy(&mut body, &mut file).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write stream to file {}: {}",
                partial.path().display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to sync file {}: {}",
                partial.path().display(),
                e
            ))
        })?;
        drop(file);

        fs::rename(partial.path(), &path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to move {} into place: {}",
                path.display(),
                e
            ))
        })?;
        partial.commit();

        tracing::info!(
            path = %path.display(),
            id = %id,
            content_type = %content_type,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local blob upload successful"
        );

        Ok((id, bytes_copied))
    }

    async fn resolve_url(&self, id: &str) -> StorageResult<String> {
        self.id_to_path(id)?;
        Ok(self.generate_url(id))
    }

    async fn content_length(&self, id: &str) -> StorageResult<u64> {
        let path = self.id_to_path(id)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(id.to_string()))
            }
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        let path = self.id_to_path(id)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        let path = self.id_to_path(id)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            id = %id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local blob delete successful"
        );

        Ok(())
    }

    async fn download(&self, id: &str) -> StorageResult<Vec<u8>> {
        let path = self.id_to_path(id)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(id.to_string()));
        }

        fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

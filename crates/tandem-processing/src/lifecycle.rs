//! Temporary source file ownership and the pipeline deadline.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tandem_core::{PipelineError, PipelineResult};
use tokio::fs::{File, OpenOptions};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Created,
    InUse,
    PendingCleanup,
    Removed,
}

/// The on-disk copy of an upload.
///
/// Removal happens once: either through [`SourceFile::remove`] or, if that
/// never completed, when the value is dropped (including during unwinding).
#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    state: Mutex<SourceState>,
}

impl SourceFile {
    /// Create `{dir}/{media_id}-source` and open it for writing.
    pub async fn create(dir: &Path, media_id: Uuid) -> io::Result<(Self, File)> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}-source", media_id));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        tracing::debug!(path = %path.display(), "Source file created");

        Ok((
            Self {
                path,
                state: Mutex::new(SourceState::Created),
            },
            file,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> SourceState {
        *self.lock()
    }

    /// Ingestion is over; the file is now read-only for the producers.
    pub fn mark_in_use(&self) {
        let mut state = self.lock();
        if *state == SourceState::Created {
            *state = SourceState::InUse;
        }
    }

    /// Delete the file. Returns `true` for the call that performed the removal.
    pub async fn remove(&self) -> bool {
        {
            let mut state = self.lock();
            if matches!(*state, SourceState::PendingCleanup | SourceState::Removed) {
                return false;
            }
            *state = SourceState::PendingCleanup;
        }

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Source file removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove source file"
            ),
        }

        *self.lock() = SourceState::Removed;
        true
    }

    fn lock(&self) -> MutexGuard<'_, SourceState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for SourceFile {
    fn drop(&mut self) {
        let state = self.lock();
        if *state == SourceState::Removed {
            return;
        }
        drop(state);

        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Source file removed on drop"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove source file on drop"
            ),
        }
        *self.lock() = SourceState::Removed;
    }
}

/// Runs the producers against the source file under one global deadline and
/// removes the file afterwards, whichever way the run ended.
#[derive(Debug)]
pub struct LifecycleSupervisor {
    source: SourceFile,
    deadline: Duration,
}

impl LifecycleSupervisor {
    pub fn new(source: SourceFile, deadline: Duration) -> Self {
        Self { source, deadline }
    }

    pub fn source_path(&self) -> &Path {
        self.source.path()
    }

    /// Drive `work` to completion or until the deadline. On timeout `work` is
    /// dropped; tasks it only borrows keep running until their owner stops them.
    pub async fn supervise<F, T>(self, work: F) -> PipelineResult<T>
    where
        F: Future<Output = T>,
    {
        self.source.mark_in_use();
        let outcome = tokio::time::timeout(self.deadline, work).await;
        self.source.remove().await;

        outcome.map_err(|_| {
            tracing::warn!(
                path = %self.source.path().display(),
                deadline_secs = self.deadline.as_secs_f64(),
                "Pipeline deadline elapsed, producers abandoned"
            );
            PipelineError::Timeout(self.deadline)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_source_file_state_machine() {
        let dir = tempdir().unwrap();
        let (source, mut file) = SourceFile::create(dir.path(), Uuid::new_v4()).await.unwrap();
        file.write_all(b"data").await.unwrap();
        drop(file);

        assert_eq!(source.state(), SourceState::Created);
        source.mark_in_use();
        assert_eq!(source.state(), SourceState::InUse);

        assert!(source.remove().await);
        assert_eq!(source.state(), SourceState::Removed);
        assert!(!source.path().exists());
        assert!(!source.remove().await);
    }

    #[tokio::test]
    async fn test_source_file_removed_on_drop() {
        let dir = tempdir().unwrap();
        let (source, file) = SourceFile::create(dir.path(), Uuid::new_v4()).await.unwrap();
        drop(file);
        let path = source.path().to_path_buf();
        assert!(path.exists());

        drop(source);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_source_file_removed_when_task_panics() {
        let dir = tempdir().unwrap();
        let (source, file) = SourceFile::create(dir.path(), Uuid::new_v4()).await.unwrap();
        drop(file);
        let path = source.path().to_path_buf();

        let handle = tokio::spawn(async move {
            let _owned = source;
            panic!("producer blew up");
        });
        assert!(handle.await.unwrap_err().is_panic());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_supervisor_removes_file_after_completion() {
        let dir = tempdir().unwrap();
        let (source, file) = SourceFile::create(dir.path(), Uuid::new_v4()).await.unwrap();
        drop(file);
        let path = source.path().to_path_buf();

        let supervisor = LifecycleSupervisor::new(source, Duration::from_secs(5));
        let value = supervisor.supervise(async { 42 }).await.unwrap();

        assert_eq!(value, 42);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_supervisor_times_out_and_still_removes_file() {
        let dir = tempdir().unwrap();
        let (source, file) = SourceFile::create(dir.path(), Uuid::new_v4()).await.unwrap();
        drop(file);
        let path = source.path().to_path_buf();

        let supervisor = LifecycleSupervisor::new(source, Duration::from_millis(50));
        let result = supervisor
            .supervise(tokio::time::sleep(Duration::from_secs(10)))
            .await;

        assert!(matches!(result, Err(PipelineError::Timeout(_))));
        assert!(!path.exists());
    }
}

//! Persistence collaborator for finished media records.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{PhotoRecord, VideoRecord};

/// Stores finished records. The pipeline calls each method at most once per run.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn create_video(&self, record: &VideoRecord) -> Result<()>;

    async fn create_photo(&self, record: &PhotoRecord) -> Result<()>;
}

/// Process-local repository used by the CLI and by tests.
#[derive(Clone, Default)]
#[allow(clippy::type_complexity)]
pub struct InMemoryMediaRepository {
    videos: Arc<Mutex<HashMap<Uuid, VideoRecord>>>,
    photos: Arc<Mutex<HashMap<Uuid, PhotoRecord>>>,
    create_calls: Arc<Mutex<usize>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryMediaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_video(&self, id: Uuid) -> Option<VideoRecord> {
        lock(&self.videos).get(&id).cloned()
    }

    pub fn get_photo(&self, id: Uuid) -> Option<PhotoRecord> {
        lock(&self.photos).get(&id).cloned()
    }

    pub fn video_count(&self) -> usize {
        lock(&self.videos).len()
    }

    pub fn photo_count(&self) -> usize {
        lock(&self.photos).len()
    }

    /// Total number of create calls, including ones that replaced an existing id.
    pub fn create_calls(&self) -> usize {
        *lock(&self.create_calls)
    }
}

#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn create_video(&self, record: &VideoRecord) -> Result<()> {
        *lock(&self.create_calls) += 1;
        if lock(&self.videos).insert(record.id, record.clone()).is_some() {
            tracing::warn!(media_id = %record.id, "Video record created twice");
        }
        Ok(())
    }

    async fn create_photo(&self, record: &PhotoRecord) -> Result<()> {
        *lock(&self.create_calls) += 1;
        if lock(&self.photos).insert(record.id, record.clone()).is_some() {
            tracing::warn!(media_id = %record.id, "Photo record created twice");
        }
        Ok(())
    }
}

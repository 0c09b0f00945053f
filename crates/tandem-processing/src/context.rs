use std::sync::Arc;

use tandem_core::{Config, MediaRepository, RealtimeNotifier};
use tandem_storage::BlobStore;

/// Collaborators shared by the video and photo pipelines.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn BlobStore>,
    pub notifier: Arc<dyn RealtimeNotifier>,
    pub repository: Arc<dyn MediaRepository>,
}

impl PipelineContext {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn BlobStore>,
        notifier: Arc<dyn RealtimeNotifier>,
        repository: Arc<dyn MediaRepository>,
    ) -> Self {
        Self {
            config,
            store,
            notifier,
            repository,
        }
    }
}

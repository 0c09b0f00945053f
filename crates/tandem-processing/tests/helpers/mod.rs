#![allow(dead_code)]

pub mod fixtures;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tandem_core::{
    Config, InMemoryMediaRepository, RealtimeEvent, RealtimeNotifier, StorageBackend,
    TranscodeTarget,
};
use tandem_processing::{
    PhotoPipeline, PipelineContext, Probe, ToolCommand, TranscodeProfile, VideoPipeline,
};
use tandem_storage::LocalBlobStore;
use tempfile::TempDir;
use uuid::Uuid;

/// Notifier that keeps every pushed event for later inspection.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<(Uuid, RealtimeEvent)>>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(Uuid, RealtimeEvent)> {
        self.events.lock().unwrap().clone()
    }

    /// Progress percentages sent for one media item, in push order.
    pub fn progress_values(&self, media_id: Uuid) -> Vec<f32> {
        self.events()
            .into_iter()
            .filter_map(|(_, event)| match event {
                RealtimeEvent::Progress(p) if p.id == media_id => Some(p.progress),
                _ => None,
            })
            .collect()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(|(_, event)| event.kind()).collect()
    }
}

#[async_trait]
impl RealtimeNotifier for RecordingNotifier {
    async fn push(&self, user_id: Uuid, event: RealtimeEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push((user_id, event));
        Ok(())
    }
}

/// A pipeline context backed by a temporary directory: local blob store,
/// in-memory repository and a recording notifier.
pub struct TestHarness {
    pub ctx: PipelineContext,
    pub store: Arc<LocalBlobStore>,
    pub notifier: RecordingNotifier,
    pub repository: InMemoryMediaRepository,
    pub frame_png: PathBuf,
    dir: TempDir,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let blob_dir = dir.path().join("blobs");

        let mut config = Config::default();
        config.temp_dir = dir.path().join("sources");
        config.storage.backend = StorageBackend::Local;
        config.storage.local_path = Some(blob_dir.clone());
        config.storage.local_base_url = Some("http://media.test/blobs".to_string());
        config.limits.probe_timeout = Duration::from_secs(5);
        config.limits.transcode_timeout = Duration::from_secs(30);
        customize(&mut config);

        let store = Arc::new(
            LocalBlobStore::new(blob_dir, "http://media.test/blobs".to_string())
                .await
                .unwrap(),
        );
        let notifier = RecordingNotifier::default();
        let repository = InMemoryMediaRepository::new();
        let ctx = PipelineContext::new(
            Arc::new(config),
            store.clone(),
            Arc::new(notifier.clone()),
            Arc::new(repository.clone()),
        );

        let frame_png = dir.path().join("frame.png");
        fixtures::write_png(&frame_png, 320, 180);

        Self {
            ctx,
            store,
            notifier,
            repository,
            frame_png,
            dir,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// File the fake encoders append their name to on every run.
    pub fn encoder_log(&self) -> PathBuf {
        self.dir.path().join("encoders.log")
    }

    pub fn encoder_runs(&self) -> Vec<String> {
        std::fs::read_to_string(self.encoder_log())
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn source_files(&self) -> usize {
        count_files(&self.ctx.config.temp_dir)
    }

    pub fn blob_files(&self) -> usize {
        count_files(&self.dir.path().join("blobs"))
    }

    /// Video pipeline with a 30 second probe result, logging pass-through
    /// encoders and a frame extractor that emits a fixed PNG.
    pub fn video_pipeline(&self) -> VideoPipeline {
        let log = self.encoder_log();
        self.video_pipeline_with(
            fixtures::fake_probe("00:00:30.00"),
            fixtures::logging_encoder("mp4", &log),
            fixtures::logging_encoder("webm", &log),
        )
    }

    pub fn video_pipeline_with(&self, probe: Probe, mp4: ToolCommand, webm: ToolCommand) -> VideoPipeline {
        let encoding = &self.ctx.config.encoding;
        VideoPipeline::new(self.ctx.clone())
            .with_probe(probe)
            .with_profiles(vec![
                TranscodeProfile::with_command(TranscodeTarget::Mp4, mp4, encoding),
                TranscodeProfile::with_command(TranscodeTarget::Webm, webm, encoding),
            ])
            .with_frame_command(fixtures::frame_command(&self.frame_png))
            .with_progress_poll_interval(Duration::from_millis(10))
    }

    pub fn photo_pipeline(&self) -> PhotoPipeline {
        PhotoPipeline::new(self.ctx.clone()).with_progress_poll_interval(Duration::from_millis(10))
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0)
}

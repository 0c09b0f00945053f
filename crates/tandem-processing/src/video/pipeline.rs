//! Video ingest orchestration.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tandem_core::{
    Artifact, FormatPreferences, Locator, PipelineError, PipelineResult, RealtimeEvent,
    TranscodeTarget, VideoRecord,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

use crate::aggregator::ProgressAggregator;
use crate::command::ToolCommand;
use crate::context::PipelineContext;
use crate::image::ImageEncoder;
use crate::lifecycle::{LifecycleSupervisor, SourceFile};
use crate::probe::Probe;
use crate::request::UploadRequest;
use crate::tee::ProgressCounter;
use crate::upload::UploadMultiplexer;

use super::profile::TranscodeProfile;
use super::thumbnail::{ThumbnailExtractor, ThumbnailSet};
use super::worker::TranscodeWorker;

const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Terminal result of one producer task.
enum Produced {
    Rendition(TranscodeTarget, PipelineResult<Locator>),
    Thumbnails(PipelineResult<ThumbnailSet>),
}

/// An upload that passed every pre-check and sits fully on disk.
struct Prepared {
    record: VideoRecord,
    source: SourceFile,
    total_bytes: u64,
    preferences: FormatPreferences,
}

/// Background processing started by [`VideoPipeline::start`].
#[derive(Debug)]
pub struct IngestHandle {
    record: VideoRecord,
    task: JoinHandle<PipelineResult<VideoRecord>>,
}

impl IngestHandle {
    /// The record as it stood when processing began: id, owner and duration,
    /// no artifacts.
    pub fn provisional(&self) -> &VideoRecord {
        &self.record
    }

    /// Wait for the final record. A panic in the processing task is resumed
    /// on the caller.
    pub async fn finish(self) -> PipelineResult<VideoRecord> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(PipelineError::SourceFile(io::Error::new(
                io::ErrorKind::Interrupted,
                "video processing task cancelled",
            ))),
        }
    }

    /// Abandon processing. Encoders are killed and the source file removed.
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Validates a video upload, spools it to a source file, probes it, then runs
/// both transcodes and the thumbnail extraction concurrently under one
/// deadline.
#[derive(Clone)]
pub struct VideoPipeline {
    ctx: PipelineContext,
    probe: Probe,
    profiles: Vec<TranscodeProfile>,
    frame_command: ToolCommand,
    progress_poll: Duration,
}

impl VideoPipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        let config = ctx.config.clone();
        Self {
            probe: Probe::ffprobe(&config.tools.ffprobe_path, config.limits.probe_timeout),
            profiles: TranscodeProfile::defaults(&config.tools.ffmpeg_path, &config.encoding),
            frame_command: ThumbnailExtractor::ffmpeg_command(&config.tools.ffmpeg_path),
            progress_poll: PROGRESS_POLL_INTERVAL,
            ctx,
        }
    }

    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_profiles(mut self, profiles: Vec<TranscodeProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_frame_command(mut self, command: ToolCommand) -> Self {
        self.frame_command = command;
        self
    }

    pub fn with_progress_poll_interval(mut self, interval: Duration) -> Self {
        self.progress_poll = interval;
        self
    }

    /// Run the whole pipeline and return the persisted record.
    #[tracing::instrument(skip(self, request), fields(
        user_id = %request.user_id,
        content_length = request.content_length
    ))]
    pub async fn ingest(&self, request: UploadRequest) -> PipelineResult<VideoRecord> {
        let prepared = self.prepare(request).await?;
        self.process(prepared).await
    }

    /// Run the pre-checks inline, then continue in a background task.
    ///
    /// Fatal pre-check failures are returned directly and nothing is spawned.
    #[tracing::instrument(skip(self, request), fields(
        user_id = %request.user_id,
        content_length = request.content_length
    ))]
    pub async fn start(&self, request: UploadRequest) -> PipelineResult<IngestHandle> {
        let prepared = self.prepare(request).await?;
        let record = prepared.record.clone();

        let pipeline = self.clone();
        let task = tokio::spawn(async move { pipeline.process(prepared).await });

        Ok(IngestHandle { record, task })
    }

    async fn prepare(&self, request: UploadRequest) -> PipelineResult<Prepared> {
        let limits = &self.ctx.config.limits;
        if request.content_length > limits.max_video_bytes {
            tracing::info!(
                size = request.content_length,
                limit = limits.max_video_bytes,
                "Video rejected before reading"
            );
            return Err(PipelineError::SizeLimitExceeded {
                size: request.content_length,
                limit: limits.max_video_bytes,
            });
        }

        let media_id = Uuid::new_v4();
        let (source, mut file) = SourceFile::create(&self.ctx.config.temp_dir, media_id).await?;

        let UploadRequest {
            user_id,
            body,
            preferences,
            description,
            ..
        } = request;
        // One byte past the limit is enough to detect an oversized body.
        let mut body = body.take(limits.max_video_bytes + 1);

        let spooled = self.spool(&mut body, &mut file, &source).await;
        drop(file);

        let (duration, total_bytes) = match spooled {
            Ok(spooled) => spooled,
            Err(e) => {
                source.remove().await;
                tracing::info!(media_id = %media_id, error = %e, "Video rejected during ingestion");
                return Err(e);
            }
        };

        tracing::info!(
            media_id = %media_id,
            size_bytes = total_bytes,
            media_duration_secs = duration.as_secs(),
            "Video accepted"
        );

        Ok(Prepared {
            record: VideoRecord::new(media_id, user_id, duration.as_secs(), description),
            source,
            total_bytes,
            preferences,
        })
    }

    /// Copy the probe window, probe it, then copy the rest of the body.
    async fn spool<R>(
        &self,
        body: &mut R,
        file: &mut tokio::fs::File,
        source: &SourceFile,
    ) -> PipelineResult<(Duration, u64)>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        let limits = &self.ctx.config.limits;

        let mut window = (&mut *body).take(limits.probe_window_bytes);
        let window_bytes = tokio::io::copy(&mut window, file).await?;
        file.flush().await?;

        let duration = self.probe.probe(source.path()).await?;
        if duration.as_secs() > limits.max_duration_secs {
            return Err(PipelineError::DurationExceeded {
                duration_secs: duration.as_secs(),
                limit_secs: limits.max_duration_secs,
            });
        }

        let rest_bytes = tokio::io::copy(body, file).await?;
        file.flush().await?;
        let total = window_bytes + rest_bytes;
        if total > limits.max_video_bytes {
            return Err(PipelineError::SizeLimitExceeded {
                size: total,
                limit: limits.max_video_bytes,
            });
        }
        Ok((duration, total))
    }

    async fn process(&self, prepared: Prepared) -> PipelineResult<VideoRecord> {
        let Prepared {
            mut record,
            source,
            total_bytes,
            preferences,
        } = prepared;
        let start = std::time::Instant::now();
        let config = &self.ctx.config;

        let uploader = UploadMultiplexer::new(self.ctx.store.clone());
        let supervisor = LifecycleSupervisor::new(source, config.limits.transcode_timeout);
        let source_path: PathBuf = supervisor.source_path().to_path_buf();

        let counters: Vec<Arc<ProgressCounter>> = self
            .profiles
            .iter()
            .map(|_| Arc::new(ProgressCounter::new()))
            .collect();
        let aggregator = ProgressAggregator::new(
            record.id,
            record.user_id,
            counters.clone(),
            total_bytes,
            self.ctx.notifier.clone(),
            config.progress.clone(),
        )
        .with_poll_interval(self.progress_poll);

        let workers: Vec<TranscodeWorker> = self
            .profiles
            .iter()
            .zip(counters.iter())
            .map(|(profile, counter)| {
                TranscodeWorker::new(profile.clone(), uploader.clone(), counter.clone())
            })
            .collect();
        let thumbnails = ThumbnailExtractor::new(
            self.frame_command.clone(),
            config.encoding.thumbnail_size,
            ImageEncoder::from_config(&config.encoding),
            uploader.clone(),
        );

        let mut reporter = JoinSet::new();
        reporter.spawn(aggregator.run());

        let mut producers = JoinSet::new();
        for worker in workers {
            let path = source_path.clone();
            producers.spawn(async move {
                let target = worker.target();
                Produced::Rendition(target, worker.run(&path).await)
            });
        }
        let path = source_path.clone();
        producers.spawn(async move { Produced::Thumbnails(thumbnails.extract(&path).await) });

        let work = async {
            let mut produced = Vec::new();
            while let Some(joined) = producers.join_next().await {
                match joined {
                    Ok(item) => produced.push(item),
                    Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                    Err(e) => tracing::warn!(error = %e, "Producer task cancelled"),
                }
            }

            for counter in &counters {
                counter.finish();
            }
            while reporter.join_next().await.is_some() {}

            produced
        };

        let produced = match supervisor.supervise(work).await {
            Ok(produced) => produced,
            Err(e) => {
                // Wait for the aborted producers so nothing commits after the
                // discard; dropping their futures kills the encoders.
                producers.shutdown().await;
                reporter.shutdown().await;
                uploader.discard_committed().await;
                return Err(e);
            }
        };

        let mut rendition_error = None;
        for item in produced {
            match item {
                Produced::Rendition(target, Ok(locator)) => {
                    record.set_artifact(target.artifact(), locator);
                }
                Produced::Rendition(target, Err(e)) => {
                    tracing::warn!(media_id = %record.id, codec = %target, error = %e, "Rendition failed");
                    rendition_error.get_or_insert(e);
                }
                Produced::Thumbnails(Ok(set)) => {
                    for (artifact, result) in [
                        (Artifact::ThumbnailWebp, set.webp),
                        (Artifact::ThumbnailJpeg, set.jpeg),
                    ] {
                        match result {
                            Ok(locator) => record.set_artifact(artifact, locator),
                            Err(e) => tracing::warn!(
                                media_id = %record.id,
                                artifact = %artifact,
                                error = %e,
                                "Thumbnail upload failed"
                            ),
                        }
                    }
                }
                Produced::Thumbnails(Err(e)) => {
                    tracing::warn!(media_id = %record.id, error = %e, "Thumbnail extraction failed");
                }
            }
        }

        if !record.is_playable() {
            // Nothing will reference the thumbnails.
            uploader.discard_committed().await;
            return Err(rendition_error.unwrap_or_else(|| PipelineError::EncodeFailure {
                target: TranscodeTarget::Mp4,
                reason: "no rendition configured".to_string(),
            }));
        }

        record.apply_preferences(&preferences);
        self.ctx
            .repository
            .create_video(&record)
            .await
            .map_err(|e| PipelineError::StorageWriteFailure(e.to_string()))?;

        if let Err(e) = self
            .ctx
            .notifier
            .push(record.user_id, RealtimeEvent::VideoReady(Box::new(record.clone())))
            .await
        {
            tracing::warn!(media_id = %record.id, error = %e, "Failed to push video ready event");
        }

        tracing::info!(
            media_id = %record.id,
            complete = record.is_complete(),
            duration_ms = start.elapsed().as_millis(),
            "Video processing completed"
        );

        Ok(record)
    }
}

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use image::GenericImageView;
use tandem_core::{
    Artifact, EncodingConfig, Locator, PhotoRecord, PipelineError, PipelineResult, RealtimeEvent,
};
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::aggregator::ProgressAggregator;
use crate::context::PipelineContext;
use crate::image::{ops, ImageEncoder};
use crate::request::UploadRequest;
use crate::tee::{ProgressCounter, ProgressTee};
use crate::upload::UploadMultiplexer;

const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Everything derived from one decoded photo.
struct EncodedPhoto {
    width: u32,
    height: u32,
    image_jpeg: PipelineResult<Bytes>,
    image_webp: Bytes,
    thumbnail_jpeg: PipelineResult<Bytes>,
    thumbnail_webp: Bytes,
}

fn encode_photo(
    data: &[u8],
    encoding: &EncodingConfig,
    encoder: ImageEncoder,
) -> PipelineResult<EncodedPhoto> {
    let img = ops::decode(data)
        .map_err(|e| PipelineError::UnprobableMedia(format!("failed to decode image: {}", e)))?;

    let resized = ops::fit_within(&img, encoding.photo_max_dimension);
    let thumbnail = ops::square_thumbnail(&img, encoding.thumbnail_size);
    let (width, height) = resized.dimensions();

    let jpeg = |artifact: Artifact, img: &image::DynamicImage| {
        encoder.jpeg(img).map_err(|e| PipelineError::UploadFailure {
            artifact,
            reason: format!("failed to encode jpeg: {}", e),
        })
    };

    Ok(EncodedPhoto {
        width,
        height,
        image_jpeg: jpeg(Artifact::ImageJpeg, &resized),
        image_webp: encoder.webp(&resized),
        thumbnail_jpeg: jpeg(Artifact::ThumbnailJpeg, &thumbnail),
        thumbnail_webp: encoder.webp(&thumbnail),
    })
}

async fn upload_encoded(
    uploader: &UploadMultiplexer,
    artifact: Artifact,
    content_type: &str,
    data: PipelineResult<Bytes>,
) -> PipelineResult<Locator> {
    uploader.upload_bytes(artifact, content_type, data?).await
}

/// Reads a photo upload into memory, downscales it and stores it with a
/// square thumbnail, each in JPEG and WebP.
#[derive(Clone)]
pub struct PhotoPipeline {
    ctx: PipelineContext,
    progress_poll: Duration,
}

impl PhotoPipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Self {
            ctx,
            progress_poll: PROGRESS_POLL_INTERVAL,
        }
    }

    pub fn with_progress_poll_interval(mut self, interval: Duration) -> Self {
        self.progress_poll = interval;
        self
    }

    #[tracing::instrument(skip(self, request), fields(
        user_id = %request.user_id,
        content_length = request.content_length
    ))]
    pub async fn ingest(&self, request: UploadRequest) -> PipelineResult<PhotoRecord> {
        let start = std::time::Instant::now();
        let config = &self.ctx.config;
        let limit = config.limits.max_photo_bytes;
        if request.content_length > limit {
            return Err(PipelineError::SizeLimitExceeded {
                size: request.content_length,
                limit,
            });
        }

        let UploadRequest {
            user_id,
            content_length,
            body,
            preferences,
            description,
        } = request;
        let media_id = Uuid::new_v4();

        let counter = Arc::new(ProgressCounter::new());
        let aggregator = ProgressAggregator::new(
            media_id,
            user_id,
            vec![counter.clone()],
            content_length,
            self.ctx.notifier.clone(),
            config.progress.clone(),
        )
        .with_poll_interval(self.progress_poll);

        let read = async {
            let mut data = Vec::with_capacity(content_length as usize);
            let mut reader = ProgressTee::new(body.take(limit + 1), counter.clone());
            let result = reader.read_to_end(&mut data).await;
            // A failed read never reaches end-of-stream on its own.
            counter.finish();
            result.map(|_| data)
        };
        let (data, ()) = tokio::join!(read, aggregator.run());
        let data = data?;

        if data.len() as u64 > limit {
            return Err(PipelineError::SizeLimitExceeded {
                size: data.len() as u64,
                limit,
            });
        }

        let encoding = config.encoding.clone();
        let encoder = ImageEncoder::from_config(&encoding);
        let encoded = tokio::task::spawn_blocking(move || encode_photo(&data, &encoding, encoder))
            .await
            .map_err(|e| PipelineError::UnprobableMedia(format!("image task failed: {}", e)))??;

        let uploader = UploadMultiplexer::new(self.ctx.store.clone());
        let (image_jpeg, image_webp, thumbnail_jpeg, thumbnail_webp) = tokio::join!(
            upload_encoded(&uploader, Artifact::ImageJpeg, "image/jpeg", encoded.image_jpeg),
            upload_encoded(&uploader, Artifact::ImageWebp, "image/webp", Ok(encoded.image_webp)),
            upload_encoded(&uploader, Artifact::ThumbnailJpeg, "image/jpeg", encoded.thumbnail_jpeg),
            upload_encoded(&uploader, Artifact::ThumbnailWebp, "image/webp", Ok(encoded.thumbnail_webp)),
        );

        let mut record = PhotoRecord::new(media_id, user_id, encoded.width, encoded.height, description);
        let mut image_error = None;
        for (artifact, result) in [
            (Artifact::ImageJpeg, image_jpeg),
            (Artifact::ImageWebp, image_webp),
            (Artifact::ThumbnailJpeg, thumbnail_jpeg),
            (Artifact::ThumbnailWebp, thumbnail_webp),
        ] {
            match result {
                Ok(locator) => record.set_artifact(artifact, locator),
                Err(e) => {
                    tracing::warn!(media_id = %media_id, artifact = %artifact, error = %e, "Photo artifact failed");
                    if matches!(artifact, Artifact::ImageJpeg | Artifact::ImageWebp) {
                        image_error.get_or_insert(e);
                    }
                }
            }
        }

        if !record.has_image() {
            // Only thumbnails were stored and nothing will reference them.
            uploader.discard_committed().await;
            return Err(image_error.unwrap_or_else(|| PipelineError::UploadFailure {
                artifact: Artifact::ImageJpeg,
                reason: "no image stored".to_string(),
            }));
        }

        record.apply_preferences(&preferences);
        self.ctx
            .repository
            .create_photo(&record)
            .await
            .map_err(|e| PipelineError::StorageWriteFailure(e.to_string()))?;

        if let Err(e) = self
            .ctx
            .notifier
            .push(user_id, RealtimeEvent::PhotoReady(Box::new(record.clone())))
            .await
        {
            tracing::warn!(media_id = %media_id, error = %e, "Failed to push photo ready event");
        }

        tracing::info!(
            media_id = %media_id,
            width = record.width,
            height = record.height,
            duration_ms = start.elapsed().as_millis(),
            "Photo processing completed"
        );

        Ok(record)
    }
}

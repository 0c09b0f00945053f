mod helpers;

use std::io::Cursor;
use std::time::Duration;

use helpers::fixtures::{self, clip_bytes};
use helpers::TestHarness;
use tandem_core::{ErrorMetadata, FormatPreferences, PipelineError, TranscodeTarget, VideoFormat};
use tandem_processing::UploadRequest;
use tandem_storage::BlobStore;
use uuid::Uuid;

fn request(body: Vec<u8>) -> UploadRequest {
    UploadRequest::new(Uuid::new_v4(), body.len() as u64, Cursor::new(body))
}

#[tokio::test]
async fn test_oversized_video_rejected_without_source_file() {
    let harness = TestHarness::new().await;
    let pipeline = harness.video_pipeline();

    let req = UploadRequest::new(Uuid::new_v4(), 50 * 1024 * 1024 + 1, Cursor::new(Vec::new()));
    let err = pipeline.ingest(req).await.unwrap_err();

    assert!(matches!(err, PipelineError::SizeLimitExceeded { .. }));
    assert_eq!(err.http_status_code(), 413);
    assert!(!harness.ctx.config.temp_dir.exists());
    assert!(harness.encoder_runs().is_empty());
}

#[tokio::test]
async fn test_body_longer_than_declared_is_capped() {
    let harness = TestHarness::with_config(|config| config.limits.max_video_bytes = 1024).await;
    let pipeline = harness.video_pipeline();

    let req = UploadRequest::new(Uuid::new_v4(), 100, Cursor::new(clip_bytes(4096)));
    let err = pipeline.ingest(req).await.unwrap_err();

    match err {
        PipelineError::SizeLimitExceeded { size, limit } => {
            assert_eq!(limit, 1024);
            assert_eq!(size, 1025);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(harness.source_files(), 0);
    assert!(harness.encoder_runs().is_empty());
}

#[tokio::test]
async fn test_ingest_produces_all_artifacts() {
    let harness = TestHarness::new().await;
    let pipeline = harness.video_pipeline();
    let body = clip_bytes(10 * 1024 * 1024);
    let user_id = Uuid::new_v4();

    let req = UploadRequest::new(user_id, body.len() as u64, Cursor::new(body.clone()))
        .with_description("harbour at dusk");
    let record = pipeline.ingest(req).await.unwrap();

    assert_eq!(record.user_id, user_id);
    assert_eq!(record.duration, 30);
    assert_eq!(record.description.as_deref(), Some("harbour at dusk"));
    assert!(record.is_complete());

    // Pass-through encoders: each rendition is the source byte for byte.
    let mp4 = record.video_mp4.as_ref().unwrap();
    let webm = record.video_webm.as_ref().unwrap();
    assert_eq!(mp4.size, body.len() as u64);
    assert_eq!(mp4.content_type, "video/mp4");
    assert_eq!(webm.content_type, "video/webm");
    assert_eq!(harness.store.download(&mp4.id).await.unwrap(), body);

    for locator in [
        record.video_mp4.as_ref(),
        record.video_webm.as_ref(),
        record.thumbnail_webp.as_ref(),
        record.thumbnail_jpeg.as_ref(),
    ]
    .into_iter()
    .flatten()
    {
        assert_eq!(harness.store.resolve_url(&locator.id).await.unwrap(), locator.url);
        assert_eq!(harness.store.content_length(&locator.id).await.unwrap(), locator.size);
    }

    assert_eq!(record.url.as_deref(), Some(mp4.url.as_str()));
    assert_eq!(
        record.thumbnail_url.as_deref(),
        Some(record.thumbnail_jpeg.as_ref().unwrap().url.as_str())
    );

    let mut runs = harness.encoder_runs();
    runs.sort();
    assert_eq!(runs, vec!["mp4", "webm"]);

    assert_eq!(harness.source_files(), 0);
    assert_eq!(harness.repository.create_calls(), 1);
    assert_eq!(harness.repository.get_video(record.id), Some(record.clone()));
}

#[tokio::test]
async fn test_thumbnails_are_square() {
    let harness = TestHarness::new().await;
    let record = harness
        .video_pipeline()
        .ingest(request(clip_bytes(64 * 1024)))
        .await
        .unwrap();

    for locator in [&record.thumbnail_webp, &record.thumbnail_jpeg] {
        let data = harness
            .store
            .download(&locator.as_ref().unwrap().id)
            .await
            .unwrap();
        let thumb = image::load_from_memory(&data).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (200, 200));
    }
}

#[tokio::test]
async fn test_progress_is_monotonic_and_ends_at_100() {
    let harness = TestHarness::with_config(|config| {
        config.progress.min_interval = Duration::from_millis(0);
    })
    .await;
    let record = harness
        .video_pipeline()
        .ingest(request(clip_bytes(4 * 1024 * 1024)))
        .await
        .unwrap();

    let values = harness.notifier.progress_values(record.id);
    assert!(!values.is_empty());
    assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(values.iter().all(|v| (0.0..=100.0).contains(v)));
    assert_eq!(values.last().copied(), Some(100.0));

    // The ready event follows the last progress event.
    let kinds = harness.notifier.kinds();
    assert_eq!(kinds.last().copied(), Some("video_ready"));
}

#[tokio::test]
async fn test_preferences_pick_webm_and_webp() {
    let harness = TestHarness::new().await;
    let req = request(clip_bytes(32 * 1024)).with_preferences(FormatPreferences {
        webp: true,
        video: VideoFormat::Webm,
    });

    let record = harness.video_pipeline().ingest(req).await.unwrap();

    assert_eq!(record.url, record.video_webm.as_ref().map(|l| l.url.clone()));
    assert_eq!(
        record.thumbnail_url,
        record.thumbnail_webp.as_ref().map(|l| l.url.clone())
    );
}

#[tokio::test]
async fn test_unprobable_media_never_starts_encoders() {
    let harness = TestHarness::new().await;
    let log = harness.encoder_log();
    let pipeline = harness.video_pipeline_with(
        fixtures::fake_probe("N/A"),
        fixtures::logging_encoder("mp4", &log),
        fixtures::logging_encoder("webm", &log),
    );

    let err = pipeline.ingest(request(clip_bytes(4096))).await.unwrap_err();

    assert!(matches!(err, PipelineError::UnprobableMedia(_)));
    assert!(err.is_fatal());
    assert!(harness.encoder_runs().is_empty());
    assert_eq!(harness.source_files(), 0);
    assert_eq!(harness.blob_files(), 0);
    assert_eq!(harness.repository.create_calls(), 0);
}

#[tokio::test]
async fn test_duration_over_limit_rejected() {
    let harness = TestHarness::new().await;
    let log = harness.encoder_log();
    let pipeline = harness.video_pipeline_with(
        fixtures::fake_probe("00:06:01.00"),
        fixtures::logging_encoder("mp4", &log),
        fixtures::logging_encoder("webm", &log),
    );

    let err = pipeline.ingest(request(clip_bytes(4096))).await.unwrap_err();

    match err {
        PipelineError::DurationExceeded {
            duration_secs,
            limit_secs,
        } => {
            assert_eq!(duration_secs, 361);
            assert_eq!(limit_secs, 360);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(harness.encoder_runs().is_empty());
    assert_eq!(harness.source_files(), 0);
}

#[tokio::test]
async fn test_duration_at_limit_accepted() {
    let harness = TestHarness::new().await;
    let log = harness.encoder_log();
    let pipeline = harness.video_pipeline_with(
        fixtures::fake_probe("00:06:00.50"),
        fixtures::logging_encoder("mp4", &log),
        fixtures::logging_encoder("webm", &log),
    );

    let record = pipeline.ingest(request(clip_bytes(4096))).await.unwrap();
    assert_eq!(record.duration, 360);
}

#[tokio::test]
async fn test_one_encoder_failure_leaves_slot_empty() {
    let harness = TestHarness::new().await;
    let log = harness.encoder_log();
    let pipeline = harness.video_pipeline_with(
        fixtures::fake_probe("00:00:30.00"),
        fixtures::logging_encoder("mp4", &log),
        fixtures::failing_encoder(),
    );

    let record = pipeline.ingest(request(clip_bytes(256 * 1024))).await.unwrap();

    assert!(record.video_mp4.is_some());
    assert!(record.video_webm.is_none());
    assert!(record.thumbnail_webp.is_some());
    assert!(record.thumbnail_jpeg.is_some());
    assert!(!record.is_complete());
    assert_eq!(harness.repository.create_calls(), 1);
    assert_eq!(harness.source_files(), 0);
    // Three committed blobs, nothing left over from the failed encode.
    assert_eq!(harness.blob_files(), 3);
}

#[tokio::test]
async fn test_preferred_rendition_falls_back_when_missing() {
    let harness = TestHarness::new().await;
    let log = harness.encoder_log();
    let pipeline = harness.video_pipeline_with(
        fixtures::fake_probe("00:00:30.00"),
        fixtures::logging_encoder("mp4", &log),
        fixtures::failing_encoder(),
    );
    let req = request(clip_bytes(8 * 1024)).with_preferences(FormatPreferences {
        webp: false,
        video: VideoFormat::Webm,
    });

    let record = pipeline.ingest(req).await.unwrap();

    assert_eq!(record.url, record.video_mp4.as_ref().map(|l| l.url.clone()));
}

#[tokio::test]
async fn test_both_encoders_failing_persists_nothing() {
    let harness = TestHarness::new().await;
    let pipeline = harness.video_pipeline_with(
        fixtures::fake_probe("00:00:30.00"),
        fixtures::failing_encoder(),
        fixtures::failing_encoder(),
    );

    let err = pipeline.ingest(request(clip_bytes(64 * 1024))).await.unwrap_err();

    match err {
        PipelineError::EncodeFailure { target, reason } => {
            assert!(TranscodeTarget::ALL.contains(&target));
            assert!(reason.contains("Conversion failed!"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(harness.repository.create_calls(), 0);
    assert_eq!(harness.source_files(), 0);
    assert_eq!(harness.blob_files(), 0);
    assert!(!harness.notifier.kinds().contains(&"video_ready"));
}

#[tokio::test]
async fn test_thumbnail_failure_keeps_renditions() {
    let harness = TestHarness::new().await;
    let pipeline = harness
        .video_pipeline()
        .with_frame_command(tandem_processing::ToolCommand::new("sh").args(["-c", "exit 1"]));

    let record = pipeline.ingest(request(clip_bytes(16 * 1024))).await.unwrap();

    assert!(record.is_playable());
    assert!(record.thumbnail_webp.is_none());
    assert!(record.thumbnail_jpeg.is_none());
    assert!(record.thumbnail_url.is_none());
    assert_eq!(harness.repository.create_calls(), 1);
}

#[tokio::test]
async fn test_stalled_encoder_times_out_and_cleans_up() {
    let harness = TestHarness::with_config(|config| {
        config.limits.transcode_timeout = Duration::from_millis(500);
    })
    .await;
    let log = harness.encoder_log();
    let pipeline = harness.video_pipeline_with(
        fixtures::fake_probe("00:00:30.00"),
        fixtures::logging_encoder("mp4", &log),
        fixtures::stalled_encoder(),
    );

    let started = std::time::Instant::now();
    let err = pipeline
        .ingest(request(clip_bytes(512 * 1024)))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Timeout(d) if d == Duration::from_millis(500)));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(harness.source_files(), 0);
    assert_eq!(harness.blob_files(), 0);
    assert_eq!(harness.repository.create_calls(), 0);
}

#[tokio::test]
async fn test_timeout_discards_stored_thumbnails_and_partial_renditions() {
    let harness = TestHarness::with_config(|config| {
        config.limits.transcode_timeout = Duration::from_millis(500);
    })
    .await;
    let pipeline = harness.video_pipeline_with(
        fixtures::fake_probe("00:00:30.00"),
        fixtures::hanging_encoder(),
        fixtures::hanging_encoder(),
    );

    let err = pipeline
        .ingest(request(clip_bytes(256 * 1024)))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Timeout(_)));
    assert_eq!(harness.blob_files(), 0);
    assert_eq!(harness.source_files(), 0);
    assert_eq!(harness.repository.create_calls(), 0);
    assert!(!harness.notifier.kinds().contains(&"video_ready"));
}

#[tokio::test]
async fn test_start_returns_provisional_record() {
    let harness = TestHarness::new().await;
    let user_id = Uuid::new_v4();
    let body = clip_bytes(128 * 1024);
    let req = UploadRequest::new(user_id, body.len() as u64, Cursor::new(body));

    let handle = harness.video_pipeline().start(req).await.unwrap();
    let provisional = handle.provisional().clone();
    assert_eq!(provisional.user_id, user_id);
    assert_eq!(provisional.duration, 30);
    assert!(provisional.video_mp4.is_none());
    assert!(provisional.url.is_none());

    let record = handle.finish().await.unwrap();
    assert_eq!(record.id, provisional.id);
    assert!(record.is_complete());
    assert_eq!(harness.source_files(), 0);
}

#[tokio::test]
async fn test_start_reports_precheck_failures_directly() {
    let harness = TestHarness::new().await;
    let req = UploadRequest::new(Uuid::new_v4(), u64::MAX, Cursor::new(Vec::new()));

    let err = harness.video_pipeline().start(req).await.unwrap_err();
    assert!(matches!(err, PipelineError::SizeLimitExceeded { .. }));
}

#[tokio::test]
async fn test_aborted_start_removes_source() {
    let harness = TestHarness::new().await;
    let pipeline = harness.video_pipeline_with(
        fixtures::fake_probe("00:00:30.00"),
        fixtures::stalled_encoder(),
        fixtures::stalled_encoder(),
    );

    let handle = pipeline.start(request(clip_bytes(1024))).await.unwrap();
    assert_eq!(harness.source_files(), 1);

    handle.abort();
    let err = handle.finish().await.unwrap_err();
    assert!(matches!(err, PipelineError::SourceFile(_)));
    assert_eq!(harness.source_files(), 0);
}

//! Tandem CLI: run the media ingest pipeline against local files.
//!
//! Configuration comes from the environment (and `.env`). Records are printed
//! as JSON; progress goes to the log, or to stdout as JSON lines with
//! `--events`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tandem_core::{
    Config, ErrorMetadata, FormatPreferences, InMemoryMediaRepository, PipelineError,
    RealtimeNotifier, VideoFormat,
};
use tandem_infra::{init_telemetry, BroadcastNotifier, LoggingNotifier, UserEvent};
use tandem_processing::{PhotoPipeline, PipelineContext, Probe, UploadRequest, VideoPipeline};
use tandem_storage::create_blob_store;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "tandem", about = "Tandem media ingest pipeline")]
struct Cli {
    /// Print realtime events to stdout as JSON lines
    #[arg(long, global = true)]
    events: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the duration of a media file
    Probe {
        /// Path to the media file
        file: PathBuf,
    },
    /// Transcode a video and store both renditions plus thumbnails
    Video {
        /// Path to the video file
        file: PathBuf,
        #[command(flatten)]
        upload: UploadArgs,
        /// Preferred rendition for the record URL: mp4 or webm
        #[arg(long, default_value = "mp4")]
        video_format: VideoFormat,
        /// Print the provisional record before processing finishes
        #[arg(long)]
        provisional: bool,
    },
    /// Resize a photo and store it with thumbnails
    Photo {
        /// Path to the image file
        file: PathBuf,
        #[command(flatten)]
        upload: UploadArgs,
    },
}

#[derive(clap::Args)]
struct UploadArgs {
    /// Owning user UUID (random when omitted)
    #[arg(long)]
    user: Option<Uuid>,
    /// Prefer WebP for image URLs
    #[arg(long)]
    webp: bool,
    /// Free-form description stored on the record
    #[arg(long)]
    description: Option<String>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize record")?;
    println!("{}", out);
    Ok(())
}

async fn open_upload(
    file: &Path,
    args: UploadArgs,
    video: VideoFormat,
) -> anyhow::Result<UploadRequest> {
    let handle = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let len = handle
        .metadata()
        .await
        .with_context(|| format!("Failed to stat {}", file.display()))?
        .len();

    let mut request = UploadRequest::new(args.user.unwrap_or_else(Uuid::new_v4), len, handle)
        .with_preferences(FormatPreferences {
            webp: args.webp,
            video,
        });
    if let Some(description) = args.description {
        request = request.with_description(description);
    }
    Ok(request)
}

fn report(err: PipelineError) -> anyhow::Error {
    tracing::error!(
        error_code = err.error_code(),
        status = err.http_status_code(),
        recoverable = err.is_recoverable(),
        error = %err,
        "Pipeline failed"
    );
    anyhow::Error::new(err)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Invalid configuration")?;
    init_telemetry(config.log_format)?;

    match cli.command {
        Commands::Probe { file } => {
            let probe = Probe::ffprobe(&config.tools.ffprobe_path, config.limits.probe_timeout);
            let duration = probe.probe(&file).await.map_err(report)?;
            print_json(&serde_json::json!({
                "file": file.display().to_string(),
                "duration_secs": duration.as_secs_f64(),
            }))?;
        }
        Commands::Video {
            file,
            upload,
            video_format,
            provisional,
        } => {
            let (ctx, printer) = context(config, cli.events).await?;
            let request = open_upload(&file, upload, video_format).await?;
            let pipeline = VideoPipeline::new(ctx);

            let record = if provisional {
                let handle = pipeline.start(request).await.map_err(report)?;
                print_json(handle.provisional())?;
                handle.finish().await.map_err(report)?
            } else {
                pipeline.ingest(request).await.map_err(report)?
            };
            drop(pipeline);
            drain_events(printer).await;
            print_json(&record)?;
        }
        Commands::Photo { file, upload } => {
            let (ctx, printer) = context(config, cli.events).await?;
            let request = open_upload(&file, upload, VideoFormat::default()).await?;
            let record = PhotoPipeline::new(ctx)
                .ingest(request)
                .await
                .map_err(report)?;
            drain_events(printer).await;
            print_json(&record)?;
        }
    }

    Ok(())
}

async fn context(
    config: Config,
    events: bool,
) -> anyhow::Result<(PipelineContext, Option<JoinHandle<()>>)> {
    let store = create_blob_store(&config.storage)
        .await
        .context("Failed to initialize blob store")?;
    tracing::info!(backend = ?store.backend_type(), "Blob store ready");

    let (notifier, printer): (Arc<dyn RealtimeNotifier>, _) = if events {
        let hub = BroadcastNotifier::default();
        let printer = tokio::spawn(print_events(hub.subscribe()));
        (Arc::new(hub), Some(printer))
    } else {
        (Arc::new(LoggingNotifier), None)
    };

    let ctx = PipelineContext::new(
        Arc::new(config),
        store,
        notifier,
        Arc::new(InMemoryMediaRepository::new()),
    );
    Ok((ctx, printer))
}

fn event_line(event: &UserEvent) -> anyhow::Result<String> {
    let line = serde_json::json!({
        "user_id": event.user_id,
        "event": event.event,
    });
    serde_json::to_string(&line).context("Serialize realtime event")
}

/// Runs until every sender is dropped.
async fn print_events(mut rx: broadcast::Receiver<UserEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match event_line(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!(error = %e, "Dropping realtime event"),
            },
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event printer lagged behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// The pipeline must be dropped first so the channel closes.
async fn drain_events(printer: Option<JoinHandle<()>>) {
    if let Some(printer) = printer {
        if let Err(e) = printer.await {
            tracing::warn!(error = %e, "Event printer failed");
        }
    }
}

use std::path::Path;
use std::process::Stdio;

use bytes::Bytes;
use tandem_core::{Artifact, Locator, PipelineError, PipelineResult};
use tokio::io::AsyncReadExt;

use crate::command::{read_tail, ToolCommand};
use crate::image::{ops, ImageEncoder};
use crate::upload::UploadMultiplexer;

const FRAME_TIMESTAMP: &str = "00:00:01.00";
const MAX_FRAME_BYTES: u64 = 32 * 1024 * 1024;
const STDERR_TAIL_BYTES: usize = 1024;

/// Upload results for the two thumbnail encodings, one slot each.
#[derive(Debug)]
pub struct ThumbnailSet {
    pub webp: PipelineResult<Locator>,
    pub jpeg: PipelineResult<Locator>,
}

pub struct ThumbnailExtractor {
    command: ToolCommand,
    size: u32,
    encoder: ImageEncoder,
    uploader: UploadMultiplexer,
}

impl ThumbnailExtractor {
    pub fn new(
        command: ToolCommand,
        size: u32,
        encoder: ImageEncoder,
        uploader: UploadMultiplexer,
    ) -> Self {
        Self {
            command,
            size,
            encoder,
            uploader,
        }
    }

    /// Grab one frame at 00:00:01 from stdin as PNG on stdout.
    pub fn ffmpeg_command(ffmpeg_path: &str) -> ToolCommand {
        ToolCommand::new(ffmpeg_path).args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            "pipe:0",
            "-ss",
            FRAME_TIMESTAMP,
            "-f",
            "image2",
            "-vframes",
            "1",
            "-vcodec",
            "png",
            "pipe:1",
        ])
    }

    /// Extract, crop, resize and upload the thumbnail in both encodings.
    ///
    /// Frame and decode failures fail the whole set; the two uploads fail
    /// independently.
    #[tracing::instrument(skip(self, source), fields(
        process.executable.name = "ffmpeg",
        process.executable.path = %self.command.program,
        ffmpeg.operation = "thumbnail"
    ))]
    pub async fn extract(&self, source: &Path) -> PipelineResult<ThumbnailSet> {
        let frame = self.extract_frame(source).await?;

        let size = self.size;
        let encoder = self.encoder;
        let (webp, jpeg) = tokio::task::spawn_blocking(move || -> Result<(Bytes, Bytes), String> {
            let img = ops::decode(&frame).map_err(|e| format!("failed to decode frame: {}", e))?;
            let thumb = ops::square_thumbnail(&img, size);
            let jpeg = encoder
                .jpeg(&thumb)
                .map_err(|e| format!("failed to encode jpeg: {}", e))?;
            Ok((encoder.webp(&thumb), jpeg))
        })
        .await
        .map_err(|e| PipelineError::ThumbnailFailure(format!("thumbnail task failed: {}", e)))?
        .map_err(PipelineError::ThumbnailFailure)?;

        let (webp, jpeg) = tokio::join!(
            self.uploader
                .upload_bytes(Artifact::ThumbnailWebp, "image/webp", webp),
            self.uploader
                .upload_bytes(Artifact::ThumbnailJpeg, "image/jpeg", jpeg),
        );

        Ok(ThumbnailSet { webp, jpeg })
    }

    async fn extract_frame(&self, source: &Path) -> PipelineResult<Vec<u8>> {
        let failure = PipelineError::ThumbnailFailure;

        let input = tokio::fs::File::open(source)
            .await
            .map_err(|e| failure(format!("failed to open source: {}", e)))?
            .into_std()
            .await;

        let mut cmd = self.command.command();
        cmd.stdin(Stdio::from(input))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd
            .spawn()
            .map_err(|e| failure(format!("failed to spawn frame extractor: {}", e)))?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(failure("frame extractor pipes unavailable".to_string()));
        };

        let read_frame = async move {
            let mut frame = Vec::new();
            stdout
                .take(MAX_FRAME_BYTES + 1)
                .read_to_end(&mut frame)
                .await
                .map(|_| frame)
        };

        let (frame, stderr_tail, status) =
            tokio::join!(read_frame, read_tail(stderr, STDERR_TAIL_BYTES), child.wait());

        let status = status.map_err(|e| failure(format!("failed to wait for frame extractor: {}", e)))?;
        if !status.success() {
            return Err(failure(format!(
                "frame extractor exited with {}: {}",
                status, stderr_tail
            )));
        }

        let frame = frame.map_err(|e| failure(format!("failed to read frame: {}", e)))?;
        if frame.is_empty() {
            return Err(failure(format!("no frame at {}", FRAME_TIMESTAMP)));
        }
        if frame.len() as u64 > MAX_FRAME_BYTES {
            return Err(failure("extracted frame too large".to_string()));
        }

        Ok(frame)
    }
}

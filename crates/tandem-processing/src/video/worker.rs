//! Streaming transcode of the source file into one target codec.

use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::task::{Context, Poll};

use tandem_core::{Locator, PipelineError, PipelineResult, TranscodeTarget};
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::oneshot;

use crate::command::read_tail;
use crate::tee::{ProgressCounter, ProgressTee};
use crate::upload::UploadMultiplexer;

use super::profile::TranscodeProfile;

const STDERR_TAIL_BYTES: usize = 2048;

type ExitOutcome = Result<(), String>;

/// Holds back end-of-stream on the encoder's stdout until the process exit
/// status is known. A failed encoder turns EOF into a read error, so the blob
/// store never commits output from an unsuccessful encode.
pub struct ExitGate<R> {
    inner: R,
    exit: Option<oneshot::Receiver<ExitOutcome>>,
    outcome: Option<ExitOutcome>,
}

impl<R> ExitGate<R> {
    pub fn new(inner: R, exit: oneshot::Receiver<ExitOutcome>) -> Self {
        Self {
            inner,
            exit: Some(exit),
            outcome: None,
        }
    }
}

fn outcome_to_io(outcome: &ExitOutcome) -> io::Result<()> {
    outcome
        .clone()
        .map_err(|reason| io::Error::new(io::ErrorKind::Other, reason))
}

impl<R: AsyncRead + Unpin> AsyncRead for ExitGate<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if let Some(outcome) = &this.outcome {
            return Poll::Ready(outcome_to_io(outcome));
        }

        let before = buf.filled().len();
        let had_room = buf.remaining() > 0;
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) if had_room && buf.filled().len() == before => {}
            other => return other,
        }

        let outcome = match this.exit.as_mut() {
            Some(exit) => match Pin::new(exit).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(outcome)) => outcome,
                Poll::Ready(Err(_)) => Err("encoder exit status unavailable".to_string()),
            },
            None => Err("encoder exit status unavailable".to_string()),
        };
        this.exit = None;
        let result = outcome_to_io(&outcome);
        this.outcome = Some(outcome);
        Poll::Ready(result)
    }
}

/// Runs one encoder process: source file on stdin, encoded stream on stdout
/// straight into the blob store.
///
/// Feeding, diagnostics, the exit wait and the upload all run inside the one
/// future returned by [`TranscodeWorker::run`]; dropping it kills the encoder.
pub struct TranscodeWorker {
    profile: TranscodeProfile,
    uploader: UploadMultiplexer,
    progress: Arc<ProgressCounter>,
}

impl TranscodeWorker {
    pub fn new(
        profile: TranscodeProfile,
        uploader: UploadMultiplexer,
        progress: Arc<ProgressCounter>,
    ) -> Self {
        Self {
            profile,
            uploader,
            progress,
        }
    }

    pub fn target(&self) -> TranscodeTarget {
        self.profile.target
    }

    /// Transcode and upload. The progress counter is finished on every path.
    #[tracing::instrument(skip(self, source), fields(
        target = %self.profile.target,
        process.executable.name = "ffmpeg",
        process.executable.path = %self.profile.command.program,
        ffmpeg.operation = "transcode"
    ))]
    pub async fn run(&self, source: &Path) -> PipelineResult<Locator> {
        let result = self.transcode(source).await;
        self.progress.finish();
        result
    }

    async fn transcode(&self, source: &Path) -> PipelineResult<Locator> {
        let target = self.profile.target;
        let encode_failure = |reason: String| PipelineError::EncodeFailure { target, reason };
        let start = std::time::Instant::now();

        let input = File::open(source)
            .await
            .map_err(|e| encode_failure(format!("failed to open source: {}", e)))?;

        let mut cmd = self.profile.command.command();
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd
            .spawn()
            .map_err(|e| encode_failure(format!("failed to spawn encoder: {}", e)))?;

        let (Some(mut stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(encode_failure("encoder pipes unavailable".to_string()));
        };

        let (exit_tx, exit_rx) = oneshot::channel();

        let progress = self.progress.clone();
        let feed = async move {
            let mut reader = ProgressTee::new(input, progress);
            let copied = tokio::io::copy(&mut reader, &mut stdin).await;
            // Closing stdin is the encoder's end-of-input.
            drop(stdin);
            copied
        };

        let diagnostics = read_tail(stderr, STDERR_TAIL_BYTES);

        let wait = async {
            let outcome = match child.wait().await {
                Ok(status) if status.success() => Ok(()),
                Ok(status) => Err(format!("encoder exited with {}", status)),
                Err(e) => Err(format!("failed to wait for encoder: {}", e)),
            };
            let _ = exit_tx.send(outcome.clone());
            outcome
        };

        let uploaded = Arc::new(ProgressCounter::new());
        let output = ProgressTee::new(ExitGate::new(stdout, exit_rx), uploaded.clone());
        let upload = self
            .uploader
            .upload(target.artifact(), target.content_type(), output);

        let (fed, stderr_tail, exit, upload_result) = tokio::join!(feed, diagnostics, wait, upload);

        if let Err(reason) = exit {
            let reason = if stderr_tail.is_empty() {
                reason
            } else {
                format!("{}: {}", reason, stderr_tail)
            };
            return Err(encode_failure(reason));
        }

        match fed {
            Ok(bytes) => tracing::debug!(source_bytes = bytes, "Encoder input fully fed"),
            Err(e) => tracing::debug!(error = %e, "Encoder closed its input early"),
        }

        let locator = upload_result?;

        tracing::info!(
            id = %locator.id,
            size_bytes = uploaded.bytes_read(),
            duration_ms = start.elapsed().as_millis(),
            "Transcode completed"
        );

        Ok(locator)
    }
}

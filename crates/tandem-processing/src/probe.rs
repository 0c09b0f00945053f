//! Duration probe over the leading window of an upload.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tandem_core::{PipelineError, PipelineResult};

use crate::command::ToolCommand;

const DURATION_MARKER: &str = "Duration:";
const START_MARKER: &str = ", start:";

/// Extract the media duration from ffprobe's diagnostic text.
///
/// Looks for `Duration: HH:MM:SS.ff, start:` anywhere in `output`. A missing
/// pattern, `N/A`, or malformed digits are all `UnprobableMedia`.
pub fn parse_duration(output: &str) -> PipelineResult<Duration> {
    let after_marker = output
        .find(DURATION_MARKER)
        .map(|idx| &output[idx + DURATION_MARKER.len()..])
        .ok_or_else(|| PipelineError::UnprobableMedia("no duration in probe output".to_string()))?;

    let end = after_marker.find(START_MARKER).ok_or_else(|| {
        PipelineError::UnprobableMedia("no start marker after duration".to_string())
    })?;
    let raw = after_marker[..end].trim();

    if raw == "N/A" {
        return Err(PipelineError::UnprobableMedia(
            "duration reported as N/A".to_string(),
        ));
    }

    parse_timestamp(raw)
        .ok_or_else(|| PipelineError::UnprobableMedia(format!("malformed duration '{}'", raw)))
}

/// `HH:MM:SS.ff` with an optional fractional part.
fn parse_timestamp(raw: &str) -> Option<Duration> {
    let mut parts = raw.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds_part = parts.next()?;
    if parts.next().is_some() || minutes >= 60 {
        return None;
    }

    let (whole, fraction) = match seconds_part.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (seconds_part, ""),
    };
    let seconds: u64 = whole.parse().ok()?;
    if seconds >= 60 {
        return None;
    }

    let nanos = if fraction.is_empty() {
        0
    } else {
        if !fraction.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        // Right-pad to nanosecond precision: "5" is 500ms, "05" is 50ms.
        let digits: String = fraction.chars().chain(std::iter::repeat('0')).take(9).collect();
        digits.parse::<u32>().ok()?
    };

    Some(Duration::new(hours * 3600 + minutes * 60 + seconds, nanos))
}

/// Runs the media-inspection tool against a file and parses its duration.
#[derive(Debug, Clone)]
pub struct Probe {
    command: ToolCommand,
    timeout: Duration,
}

impl Probe {
    /// `command` is invoked with the file path appended as its last argument.
    pub fn new(command: ToolCommand, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    pub fn ffprobe(ffprobe_path: &str, timeout: Duration) -> Self {
        Self::new(ToolCommand::new(ffprobe_path).arg("-hide_banner"), timeout)
    }

    /// ffprobe exits nonzero on truncated input even when it printed the
    /// duration, so the exit status is ignored and only the text is parsed.
    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.command.program,
        ffmpeg.operation = "probe"
    ))]
    pub async fn probe(&self, path: &Path) -> PipelineResult<Duration> {
        let start = std::time::Instant::now();

        let mut cmd = self.command.command();
        cmd.arg(path).stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                PipelineError::UnprobableMedia(format!("probe timed out after {:?}", self.timeout))
            })?
            .map_err(|e| PipelineError::UnprobableMedia(format!("failed to run probe: {}", e)))?;

        let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(&output.stdout));

        let duration = parse_duration(&text)?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            media_duration_secs = duration.as_secs_f64(),
            exit_status = %output.status,
            "Media probe completed"
        );

        Ok(duration)
    }
}

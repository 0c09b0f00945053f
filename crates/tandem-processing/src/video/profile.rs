use tandem_core::{EncodingConfig, TranscodeTarget};

use crate::command::ToolCommand;

/// Encoder invocation and fixed output parameters for one target codec.
///
/// The command reads the source on stdin and writes the encoded stream to
/// stdout.
#[derive(Debug, Clone)]
pub struct TranscodeProfile {
    pub target: TranscodeTarget,
    pub bitrate_kbps: u32,
    /// Edge length of the square output.
    pub size: u32,
    pub command: ToolCommand,
}

impl TranscodeProfile {
    pub fn ffmpeg(target: TranscodeTarget, ffmpeg_path: &str, encoding: &EncodingConfig) -> Self {
        let bitrate = format!("{}k", encoding.video_bitrate_kbps);
        let filter = format!(
            "crop=min(iw\\,ih):min(iw\\,ih),scale={size}:{size}",
            size = encoding.video_size
        );

        let codec_args: [&str; 4] = match target {
            TranscodeTarget::Mp4 => ["-c:v", "libx264", "-c:a", "aac"],
            TranscodeTarget::Webm => ["-c:v", "libvpx", "-c:a", "libvorbis"],
        };

        let mut command = ToolCommand::new(ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-i", "pipe:0"])
            .args(codec_args)
            .args(["-b:v", bitrate.as_str(), "-vf", filter.as_str()]);

        command = match target {
            // MP4 on a pipe needs a fragmented layout, the moov atom cannot be
            // patched in afterwards.
            TranscodeTarget::Mp4 => command.args(["-movflags", "frag_keyframe+empty_moov", "-f", "mp4"]),
            TranscodeTarget::Webm => command.args(["-f", "webm"]),
        };

        Self {
            target,
            bitrate_kbps: encoding.video_bitrate_kbps,
            size: encoding.video_size,
            command: command.arg("pipe:1"),
        }
    }

    /// Both target profiles, primary first.
    pub fn defaults(ffmpeg_path: &str, encoding: &EncodingConfig) -> Vec<Self> {
        TranscodeTarget::ALL
            .iter()
            .map(|target| Self::ffmpeg(*target, ffmpeg_path, encoding))
            .collect()
    }

    /// Profile with a custom encoder command, keeping the configured parameters.
    pub fn with_command(target: TranscodeTarget, command: ToolCommand, encoding: &EncodingConfig) -> Self {
        Self {
            target,
            bitrate_kbps: encoding.video_bitrate_kbps,
            size: encoding.video_size,
            command,
        }
    }
}

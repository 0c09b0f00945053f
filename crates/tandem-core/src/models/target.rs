use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// The two fixed encodings every uploaded video is transcoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscodeTarget {
    /// H.264/AAC in fragmented MP4, the primary rendition.
    Mp4,
    /// VP8/Vorbis in WebM, the secondary rendition.
    Webm,
}

impl TranscodeTarget {
    pub const ALL: [TranscodeTarget; 2] = [TranscodeTarget::Mp4, TranscodeTarget::Webm];

    pub fn content_type(self) -> &'static str {
        match self {
            TranscodeTarget::Mp4 => "video/mp4",
            TranscodeTarget::Webm => "video/webm",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            TranscodeTarget::Mp4 => "mp4",
            TranscodeTarget::Webm => "webm",
        }
    }

    /// The record slot this target fills.
    pub fn artifact(self) -> Artifact {
        match self {
            TranscodeTarget::Mp4 => Artifact::VideoMp4,
            TranscodeTarget::Webm => Artifact::VideoWebm,
        }
    }
}

impl Display for TranscodeTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.extension())
    }
}

/// Client preference for the video rendition returned as `url`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    #[default]
    Mp4,
    Webm,
}

impl FromStr for VideoFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mp4" => Ok(VideoFormat::Mp4),
            "webm" => Ok(VideoFormat::Webm),
            _ => Err(anyhow::anyhow!("Invalid video format: {}", s)),
        }
    }
}

/// Every artifact slot a media record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    VideoMp4,
    VideoWebm,
    ThumbnailWebp,
    ThumbnailJpeg,
    ImageWebp,
    ImageJpeg,
}

impl Display for Artifact {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Artifact::VideoMp4 => write!(f, "video_mp4"),
            Artifact::VideoWebm => write!(f, "video_webm"),
            Artifact::ThumbnailWebp => write!(f, "thumbnail_webp"),
            Artifact::ThumbnailJpeg => write!(f, "thumbnail_jpeg"),
            Artifact::ImageWebp => write!(f, "image_webp"),
            Artifact::ImageJpeg => write!(f, "image_jpeg"),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::target::{Artifact, VideoFormat};

/// Blob-store reference for one stored artifact.
///
/// The id is opaque to the pipeline; it is only ever round-tripped into a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub id: String,
    pub url: String,
    pub content_type: String,
    pub size: u64,
}

/// Output formats the uploading client declared it can consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormatPreferences {
    pub webp: bool,
    pub video: VideoFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_mp4: Option<Locator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_webm: Option<Locator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_webp: Option<Locator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_jpeg: Option<Locator>,
    /// Rendition URL chosen from the client's preferences.
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whole seconds, as probed before transcoding.
    pub duration: u64,
    pub created_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Provisional record with no artifacts yet.
    pub fn new(id: Uuid, user_id: Uuid, duration: u64, description: Option<String>) -> Self {
        Self {
            id,
            user_id,
            video_mp4: None,
            video_webm: None,
            thumbnail_webp: None,
            thumbnail_jpeg: None,
            url: None,
            thumbnail_url: None,
            description,
            duration,
            created_at: Utc::now(),
        }
    }

    pub fn set_artifact(&mut self, artifact: Artifact, locator: Locator) {
        match artifact {
            Artifact::VideoMp4 => self.video_mp4 = Some(locator),
            Artifact::VideoWebm => self.video_webm = Some(locator),
            Artifact::ThumbnailWebp => self.thumbnail_webp = Some(locator),
            Artifact::ThumbnailJpeg => self.thumbnail_jpeg = Some(locator),
            other => {
                tracing::warn!(artifact = %other, "Ignoring image artifact on a video record");
            }
        }
    }

    /// At least one rendition can be played back.
    pub fn is_playable(&self) -> bool {
        self.video_mp4.is_some() || self.video_webm.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.video_mp4.is_some()
            && self.video_webm.is_some()
            && self.thumbnail_webp.is_some()
            && self.thumbnail_jpeg.is_some()
    }

    /// Fill `url` and `thumbnail_url` from the preferred renditions, falling back
    /// to the other encoding when the preferred one is missing.
    pub fn apply_preferences(&mut self, prefs: &FormatPreferences) {
        let (preferred, fallback) = match prefs.video {
            VideoFormat::Mp4 => (&self.video_mp4, &self.video_webm),
            VideoFormat::Webm => (&self.video_webm, &self.video_mp4),
        };
        self.url = preferred.as_ref().or(fallback.as_ref()).map(|l| l.url.clone());
        self.thumbnail_url = pick_image(&self.thumbnail_webp, &self.thumbnail_jpeg, prefs.webp);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_jpeg: Option<Locator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_webp: Option<Locator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_jpeg: Option<Locator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_webp: Option<Locator>,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
}

impl PhotoRecord {
    pub fn new(id: Uuid, user_id: Uuid, width: u32, height: u32, description: Option<String>) -> Self {
        Self {
            id,
            user_id,
            image_jpeg: None,
            image_webp: None,
            thumbnail_jpeg: None,
            thumbnail_webp: None,
            url: None,
            thumbnail_url: None,
            description,
            width,
            height,
            created_at: Utc::now(),
        }
    }

    pub fn set_artifact(&mut self, artifact: Artifact, locator: Locator) {
        match artifact {
            Artifact::ImageJpeg => self.image_jpeg = Some(locator),
            Artifact::ImageWebp => self.image_webp = Some(locator),
            Artifact::ThumbnailJpeg => self.thumbnail_jpeg = Some(locator),
            Artifact::ThumbnailWebp => self.thumbnail_webp = Some(locator),
            other => {
                tracing::warn!(artifact = %other, "Ignoring video artifact on a photo record");
            }
        }
    }

    pub fn has_image(&self) -> bool {
        self.image_jpeg.is_some() || self.image_webp.is_some()
    }

    pub fn apply_preferences(&mut self, prefs: &FormatPreferences) {
        self.url = pick_image(&self.image_webp, &self.image_jpeg, prefs.webp);
        self.thumbnail_url = pick_image(&self.thumbnail_webp, &self.thumbnail_jpeg, prefs.webp);
    }
}

fn pick_image(webp: &Option<Locator>, jpeg: &Option<Locator>, prefer_webp: bool) -> Option<String> {
    let (first, second) = if prefer_webp { (webp, jpeg) } else { (jpeg, webp) };
    first.as_ref().or(second.as_ref()).map(|l| l.url.clone())
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::media::{PhotoRecord, VideoRecord};

/// Transcode progress for one media item, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub id: Uuid,
    pub progress: f32,
}

/// Everything the pipeline pushes over the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum RealtimeEvent {
    Progress(ProgressEvent),
    VideoReady(Box<VideoRecord>),
    PhotoReady(Box<PhotoRecord>),
}

impl RealtimeEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RealtimeEvent::Progress(_) => "progress",
            RealtimeEvent::VideoReady(_) => "video_ready",
            RealtimeEvent::PhotoReady(_) => "photo_ready",
        }
    }
}

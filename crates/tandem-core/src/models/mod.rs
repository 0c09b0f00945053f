pub mod media;
pub mod progress;
pub mod target;

pub use media::{FormatPreferences, Locator, PhotoRecord, VideoRecord};
pub use progress::{ProgressEvent, RealtimeEvent};
pub use target::{Artifact, TranscodeTarget, VideoFormat};

//! Video ingest: transcode workers, thumbnail extraction and the orchestrating
//! pipeline.

pub mod pipeline;
pub mod profile;
pub mod thumbnail;
pub mod worker;

pub use pipeline::{IngestHandle, VideoPipeline};
pub use profile::TranscodeProfile;
pub use thumbnail::{ThumbnailExtractor, ThumbnailSet};
pub use worker::{ExitGate, TranscodeWorker};

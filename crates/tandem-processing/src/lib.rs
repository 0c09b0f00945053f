//! Tandem Processing Library
//!
//! The media ingest pipeline: probing, streaming transcodes, thumbnail
//! extraction, progress reporting and the lifecycle of the temporary source
//! file. Video and photo uploads enter through [`VideoPipeline`] and
//! [`PhotoPipeline`].

pub mod aggregator;
pub mod command;
pub mod context;
pub mod image;
pub mod lifecycle;
pub mod photo;
pub mod probe;
pub mod request;
pub mod tee;
pub mod upload;
pub mod video;

// Re-export commonly used types
pub use aggregator::{ProgressAggregator, ProgressThrottle};
pub use command::ToolCommand;
pub use context::PipelineContext;
pub use lifecycle::{LifecycleSupervisor, SourceFile, SourceState};
pub use photo::PhotoPipeline;
pub use probe::{parse_duration, Probe};
pub use request::UploadRequest;
pub use tee::{ProgressCounter, ProgressTee};
pub use upload::UploadMultiplexer;
pub use video::{
    IngestHandle, ThumbnailExtractor, ThumbnailSet, TranscodeProfile, TranscodeWorker,
    VideoPipeline,
};

//! Tandem Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration and
//! collaborator traits shared by every Tandem component.

pub mod config;
pub mod error;
pub mod models;
pub mod notifier;
pub mod repository;

// Re-export commonly used types
pub use config::{
    Config, EncodingConfig, LogFormat, MediaLimits, ProgressConfig, StorageBackend,
    StorageConfig, ToolPaths,
};
pub use error::{ErrorMetadata, LogLevel, PipelineError, PipelineResult};
pub use models::{
    Artifact, FormatPreferences, Locator, PhotoRecord, ProgressEvent, RealtimeEvent,
    TranscodeTarget, VideoFormat, VideoRecord,
};
pub use notifier::RealtimeNotifier;
pub use repository::{InMemoryMediaRepository, MediaRepository};

//! Photo ingest.

pub mod pipeline;

pub use pipeline::PhotoPipeline;

//! Tandem Storage Library
//!
//! Blob store abstraction plus the local filesystem and in-memory backends.
//!
//! # Blob ids
//!
//! Ids are assigned by the store on upload and are flat: `{uuid}.{extension}`.
//! They never contain `/` or `..`. Id generation lives in the `keys` module so
//! all backends stay consistent.

pub mod factory;
pub(crate) mod keys;
pub mod local;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use factory::create_blob_store;
pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use tandem_core::StorageBackend;
pub use traits::{BlobStore, StorageError, StorageResult};

//! Tandem Infrastructure Library
//!
//! Shared infrastructure for the Tandem binaries:
//! - Telemetry initialization
//! - Realtime notifier implementations

pub mod realtime;
pub mod telemetry;

// Re-export commonly used types
pub use realtime::{BroadcastNotifier, LoggingNotifier, UserEvent};
pub use telemetry::init_telemetry;

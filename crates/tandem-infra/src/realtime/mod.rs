//! Realtime notifier implementations.

mod broadcast;
mod logging;

pub use broadcast::{BroadcastNotifier, UserEvent};
pub use logging::LoggingNotifier;

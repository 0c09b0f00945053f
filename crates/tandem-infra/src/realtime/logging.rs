use anyhow::Context;
use async_trait::async_trait;
use tandem_core::{RealtimeEvent, RealtimeNotifier};
use uuid::Uuid;

/// Writes every event to the log as JSON. Used by the CLI, where there is no
/// client connection to deliver to.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl RealtimeNotifier for LoggingNotifier {
    async fn push(&self, user_id: Uuid, event: RealtimeEvent) -> anyhow::Result<()> {
        let payload =
            serde_json::to_string(&event).context("Failed to serialize realtime event")?;
        match &event {
            RealtimeEvent::Progress(progress) => tracing::info!(
                user_id = %user_id,
                media_id = %progress.id,
                progress = progress.progress,
                "Progress"
            ),
            _ => tracing::info!(user_id = %user_id, kind = event.kind(), payload = %payload, "Realtime event"),
        }
        Ok(())
    }
}

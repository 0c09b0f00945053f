use async_trait::async_trait;
use tandem_core::{RealtimeEvent, RealtimeNotifier};
use tokio::sync::broadcast;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 256;

/// An event addressed to one user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserEvent {
    pub user_id: Uuid,
    pub event: RealtimeEvent,
}

/// Fans pipeline events out to every subscriber (e.g. one per open client
/// connection). Subscribers filter on `user_id`.
///
/// Slow subscribers lag and lose the oldest events; the pipeline is never
/// blocked by them.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<UserEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UserEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl RealtimeNotifier for BroadcastNotifier {
    async fn push(&self, user_id: Uuid, event: RealtimeEvent) -> anyhow::Result<()> {
        let kind = event.kind();
        match self.tx.send(UserEvent { user_id, event }) {
            Ok(receivers) => {
                tracing::trace!(user_id = %user_id, kind, receivers, "Realtime event broadcast");
            }
            Err(_) => {
                // Nobody listening is not a delivery failure.
                tracing::debug!(user_id = %user_id, kind, "No realtime subscribers");
            }
        }
        Ok(())
    }
}

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::RealtimeEvent;

/// Realtime channel towards the uploading user's clients.
///
/// Delivery is fire-and-forget: callers log a failed push and move on.
#[async_trait]
pub trait RealtimeNotifier: Send + Sync {
    async fn push(&self, user_id: Uuid, event: RealtimeEvent) -> Result<()>;
}

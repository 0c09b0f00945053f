//! Progress aggregation and throttled realtime delivery.

use std::sync::Arc;
use std::time::Duration;

use tandem_core::{ProgressConfig, ProgressEvent, RealtimeEvent, RealtimeNotifier};
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::tee::ProgressCounter;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Decides whether a new percentage is worth sending.
///
/// A value goes out only when it moved by more than `min_step` since the last
/// emission and at least `min_interval` has passed. The clock starts when the
/// throttle is created, so nothing is sent during the first interval.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    min_step: f32,
    min_interval: Duration,
    last_value: f32,
    last_emit: Instant,
}

impl ProgressThrottle {
    pub fn new(config: &ProgressConfig, start: Instant) -> Self {
        Self {
            min_step: config.min_step,
            min_interval: config.min_interval,
            last_value: 0.0,
            last_emit: start,
        }
    }

    pub fn should_emit(&mut self, value: f32, now: Instant) -> bool {
        if value - self.last_value > self.min_step
            && now.saturating_duration_since(self.last_emit) >= self.min_interval
        {
            self.last_value = value;
            self.last_emit = now;
            true
        } else {
            false
        }
    }

    pub fn last_value(&self) -> f32 {
        self.last_value
    }
}

/// Average completion of all counters against a common total, in percent.
pub fn percentage(counters: &[Arc<ProgressCounter>], total: u64) -> f32 {
    if counters.is_empty() {
        return 100.0;
    }
    let sum: f64 = counters
        .iter()
        .map(|counter| {
            if total == 0 {
                if counter.is_finished() {
                    1.0
                } else {
                    0.0
                }
            } else {
                (counter.bytes_read() as f64 / total as f64).min(1.0)
            }
        })
        .sum();
    (sum / counters.len() as f64 * 100.0) as f32
}

/// Owns all reads of the worker counters for one media item and pushes
/// `ProgressEvent`s to the uploading user.
pub struct ProgressAggregator {
    media_id: Uuid,
    user_id: Uuid,
    counters: Vec<Arc<ProgressCounter>>,
    total: u64,
    notifier: Arc<dyn RealtimeNotifier>,
    config: ProgressConfig,
    poll_interval: Duration,
}

impl ProgressAggregator {
    pub fn new(
        media_id: Uuid,
        user_id: Uuid,
        counters: Vec<Arc<ProgressCounter>>,
        total: u64,
        notifier: Arc<dyn RealtimeNotifier>,
        config: ProgressConfig,
    ) -> Self {
        Self {
            media_id,
            user_id,
            counters,
            total,
            notifier,
            config,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Poll until every counter is finished, then send a final 100.0.
    ///
    /// Counters finish when their input stream reaches end-of-stream, which
    /// is before the encoders exit and before their uploads commit. The
    /// final 100.0 means all input was consumed; the ready event is what
    /// signals stored renditions.
    pub async fn run(self) {
        let mut throttle = ProgressThrottle::new(&self.config, Instant::now());
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut current: f32 = 0.0;

        loop {
            ticker.tick().await;
            if self.counters.iter().all(|counter| counter.is_finished()) {
                break;
            }

            // Never report a lower value than one already computed.
            current = current.max(percentage(&self.counters, self.total));
            if throttle.should_emit(current, Instant::now()) {
                self.push(current).await;
            }
        }

        self.push(100.0).await;
        tracing::debug!(media_id = %self.media_id, "Progress reporting finished");
    }

    async fn push(&self, progress: f32) {
        let event = RealtimeEvent::Progress(ProgressEvent {
            id: self.media_id,
            progress,
        });
        if let Err(e) = self.notifier.push(self.user_id, event).await {
            tracing::warn!(
                media_id = %self.media_id,
                progress = progress,
                error = %e,
                "Failed to push progress event"
            );
        }
    }
}

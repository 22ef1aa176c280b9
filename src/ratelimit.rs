//! Minimum-interval rate limiting per [`Channel`].
//!
//! Each channel is a lane with its own quota in requests per minute. A quota
//! of `0` means unbounded and makes [`RateLimiter::wait`] a no-op; so does a
//! channel that was never configured.
//!
//! The last-call timestamp of a lane sits behind an async mutex that is held
//! for the whole read → sleep → write sequence. Concurrent callers on one
//! lane therefore queue on the lock instead of all reading the same stale
//! timestamp and bursting. Whoever wins the lock goes first; there is no
//! FIFO guarantee beyond that.

use crate::model::Channel;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

struct Lane {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

/// Shared, internally synchronised limiter. Wrap in `Arc` to share.
#[derive(Default)]
pub struct RateLimiter {
    lanes: HashMap<Channel, Lane>,
}

impl RateLimiter {
    /// A limiter with no configured lanes; every wait returns immediately.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Limit `channel` to `requests_per_minute` (0 = unbounded).
    pub fn with_channel(mut self, channel: Channel, requests_per_minute: u32) -> Self {
        if requests_per_minute == 0 {
            self.lanes.remove(&channel);
        } else {
            self.lanes.insert(
                channel,
                Lane {
                    interval: Duration::from_secs_f64(60.0 / requests_per_minute as f64),
                    last_call: Mutex::new(None),
                },
            );
        }
        self
    }

    /// Minimum spacing enforced on `channel`, if any.
    pub fn interval(&self, channel: Channel) -> Option<Duration> {
        self.lanes.get(&channel).map(|l| l.interval)
    }

    /// Wait until at least one interval has passed since the previous call on
    /// `channel`, then record this call.
    pub async fn wait(&self, channel: Channel) {
        let Some(lane) = self.lanes.get(&channel) else {
            return;
        };

        let mut last_call = lane.last_call.lock().await;
        if let Some(prev) = *last_call {
            let since = prev.elapsed();
            if since < lane.interval {
                let pause = lane.interval - since;
                debug!(
                    "Rate limiting {} channel: sleeping {:.2}s",
                    channel,
                    pause.as_secs_f64()
                );
                sleep(pause).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut lanes: Vec<(Channel, Duration)> =
            self.lanes.iter().map(|(c, l)| (*c, l.interval)).collect();
        lanes.sort_by_key(|(c, _)| c.to_string());
        f.debug_struct("RateLimiter").field("lanes", &lanes).finish()
    }
}

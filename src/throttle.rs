//! Per-episode spacing of upstream fetches.
//!
//! Callers reserve the next free slot for a key under a short lock and then
//! sleep outside it, so concurrent requests for the same episode are spaced
//! by at least `min_interval` while different episodes never wait on each other.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

const PRUNE_THRESHOLD: usize = 1024;

pub struct FetchThrottle {
    min_interval: Duration,
    slots: Mutex<HashMap<String, Instant>>,
}

impl FetchThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a fetch for `key` may start
    pub async fn wait_turn(&self, key: &str) {
        let start = self.reserve(key, Instant::now());
        if start > Instant::now() {
            log::debug!(
                "Throttling upstream fetch for {} by {}ms",
                key,
                (start - Instant::now()).as_millis()
            );
            sleep_until(start).await;
        }
    }

    fn reserve(&self, key: &str, now: Instant) -> Instant {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());

        if slots.len() > PRUNE_THRESHOLD {
            let horizon = self.min_interval;
            slots.retain(|_, last| now.saturating_duration_since(*last) < horizon);
        }

        let start = match slots.get(key) {
            Some(last) => (*last + self.min_interval).max(now),
            None => now,
        };
        slots.insert(key.to_string(), start);
        start
    }
}

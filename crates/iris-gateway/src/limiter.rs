use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

pub(crate) const MAX_RATE_LIMIT_ENTRIES: usize = 10_000;
pub(crate) const RATE_WINDOW: Duration = Duration::from_secs(60);

type Key = (&'static str, IpAddr);

/// Sliding-window request log per (route, client address).
///
/// Each key keeps the instants of its accepted requests inside the window;
/// a request is admitted while fewer than `limit` remain.
#[derive(Clone)]
pub(crate) struct RateLimiter {
    window: Duration,
    hits: Arc<Mutex<HashMap<Key, VecDeque<Instant>>>>,
}

impl RateLimiter {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            hits: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a request at `now` if it fits under `limit`. Returns whether it was admitted.
    pub(crate) async fn check(&self, route: &'static str, ip: IpAddr, limit: u32, now: Instant) -> bool {
        let key = (route, ip);
        let window = self.window;
        let mut hits = self.hits.lock().await;

        if hits.len() >= MAX_RATE_LIMIT_ENTRIES && !hits.contains_key(&key) {
            hits.retain(|_, log| log.back().is_some_and(|t| now.duration_since(*t) < window));
        }

        let log = hits.entry(key).or_default();
        while log.front().is_some_and(|t| now.duration_since(*t) >= window) {
            log.pop_front();
        }
        if log.len() >= limit as usize {
            return false;
        }
        log.push_back(now);
        true
    }

    #[cfg(test)]
    pub(crate) async fn tracked_keys(&self) -> usize {
        self.hits.lock().await.len()
    }
}

//! Fixed-window admission control keyed by action label.

use std::{
    collections::{HashMap, VecDeque},
    fmt::Debug,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Source of "now" for anything that measures elapsed time.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { origin: Instant::now(), offset: Mutex::new(Duration::ZERO) }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    #[serde(rename = "window_ms", with = "millis")]
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_requests: 10, window: Duration::from_millis(60_000) }
    }
}

/// At most `max_requests` admissions per `window` for each key.
///
/// State lives as long as the limiter and is never persisted.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    hits: HashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock, hits: HashMap::new() }
    }

    /// Record an attempt for `key` and report whether it is admitted.
    ///
    /// Rejected attempts are not recorded.
    pub fn is_allowed(&mut self, key: &str) -> bool {
        let now = self.clock.now();
        let window = self.config.window;
        let hits = self.hits.entry(key.to_string()).or_default();

        while hits.front().is_some_and(|t| now.duration_since(*t) >= window) {
            hits.pop_front();
        }

        if hits.len() >= self.config.max_requests {
            debug!(key, count = hits.len(), "rate limit reached");
            return false;
        }

        hits.push_back(now);
        true
    }

    /// Admissions left for `key` in the current window.
    pub fn remaining(&self, key: &str) -> usize {
        let now = self.clock.now();
        let used = self.hits.get(key).map_or(0, |hits| {
            hits.iter().filter(|t| now.duration_since(**t) < self.config.window).count()
        });
        self.config.max_requests.saturating_sub(used)
    }

    pub fn reset(&mut self, key: &str) {
        self.hits.remove(key);
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

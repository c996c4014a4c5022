//! Rate Limiting Infrastructure
//!
//! Fixed-window counters keyed by an arbitrary string (typically
//! `"<route class or path>:<client ip>"`). The first hit in a window starts
//! it; the counter resets once the window has elapsed.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl RateLimitConfig {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window resets
    pub reset_after: Duration,
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Rate limit store unavailable: {0}")]
    Unavailable(String),
}

/// Trait for rate limit storage backends
///
/// Callers fail open on `Err`: an unavailable store must never block traffic.
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    /// Count this request against `key` and report whether it is allowed.
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError>;
}

// ============================================================================
// In-process store
// ============================================================================

/// Entries beyond this count make lapsed windows eligible for a sweep.
const SWEEP_THRESHOLD: usize = 10_000;

/// At most one sweep per interval, however many keys are live.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Window {
    count: u32,
    started_at: Instant,
    length: Duration,
}

impl Window {
    fn lapsed(&self, now: Instant) -> bool {
        now.duration_since(self.started_at) >= self.length
    }
}

#[derive(Debug, Default)]
struct Windows {
    entries: HashMap<String, Window>,
    last_sweep: Option<Instant>,
}

impl Windows {
    fn sweep(&mut self, now: Instant) {
        let due = self
            .last_sweep
            .is_none_or(|last| now.duration_since(last) >= SWEEP_INTERVAL);
        if self.entries.len() > SWEEP_THRESHOLD && due {
            self.entries.retain(|_, w| !w.lapsed(now));
            self.last_sweep = Some(now);
        }
    }
}

/// Process-local fixed-window store.
///
/// Counters are not shared between replicas; each instance enforces its own
/// ceiling.
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    windows: Mutex<Windows>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn hit(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now: Instant,
    ) -> Result<RateLimitResult, RateLimitError> {
        let mut windows = self
            .windows
            .lock()
            .map_err(|e| RateLimitError::Unavailable(e.to_string()))?;

        windows.sweep(now);

        let window = windows.entries.entry(key.to_string()).or_insert(Window {
            count: 0,
            started_at: now,
            length: config.window,
        });
        if window.lapsed(now) {
            window.count = 0;
            window.started_at = now;
            window.length = config.window;
        }
        window.count = window.count.saturating_add(1);

        let reset_after = window
            .length
            .saturating_sub(now.duration_since(window.started_at));

        Ok(RateLimitResult {
            allowed: window.count <= config.max_requests,
            limit: config.max_requests,
            remaining: config.max_requests.saturating_sub(window.count),
            reset_after,
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.windows.lock().map(|w| w.entries.len()).unwrap_or(0)
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError> {
        self.hit(key, config, Instant::now())
    }
}

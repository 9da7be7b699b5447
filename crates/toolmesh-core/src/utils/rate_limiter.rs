//! Rate limiting for request throttling
//!
//! Sliding-window limiter keyed by resource name. Each resource owns its own
//! bucket behind its own lock, so a busy resource never blocks another.

use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window for rate limiting
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// Create a new rate limit config
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// Create config for requests per second
    #[must_use]
    pub fn per_second(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(1))
    }

    /// Create config for requests per minute
    #[must_use]
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    /// Create config for requests per hour
    #[must_use]
    pub fn per_hour(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(3600))
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the request was admitted
    pub allowed: bool,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Time until the oldest counted request leaves the window
    pub retry_after: Duration,
    /// Requests counted in the window, including this one if admitted
    pub current: u32,
}

#[derive(Debug)]
struct Bucket {
    config: RateLimitConfig,
    timestamps: VecDeque<Instant>,
}

impl Bucket {
    fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            timestamps: VecDeque::new(),
        }
    }

    /// Drop timestamps that have left the window
    fn evict(&mut self, now: Instant) {
        while let Some(oldest) = self.timestamps.front() {
            if now.duration_since(*oldest) >= self.config.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn retry_after(&self, now: Instant) -> Duration {
        self.timestamps.front().map_or(Duration::ZERO, |oldest| {
            self.config
                .window
                .saturating_sub(now.duration_since(*oldest))
        })
    }

    fn admit(&mut self, now: Instant) -> RateLimitResult {
        self.evict(now);
        let count = self.timestamps.len() as u32;

        if count < self.config.max_requests {
            self.timestamps.push_back(now);
            RateLimitResult {
                allowed: true,
                remaining: self.config.max_requests - count - 1,
                retry_after: self.retry_after(now),
                current: count + 1,
            }
        } else {
            RateLimitResult {
                allowed: false,
                remaining: 0,
                retry_after: self.retry_after(now),
                current: count,
            }
        }
    }
}

/// In-memory rate limiter using sliding window algorithm
#[derive(Debug, Default)]
pub struct RateLimiter {
    default_config: RateLimitConfig,
    overrides: HashMap<String, RateLimitConfig>,
    buckets: DashMap<String, Arc<Mutex<Bucket>>>,
}

impl RateLimiter {
    /// Create a new rate limiter applying `config` to every resource
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            default_config: config,
            ..Self::default()
        }
    }

    /// Use a specific limit for one resource
    #[must_use]
    pub fn with_override(mut self, resource: impl Into<String>, config: RateLimitConfig) -> Self {
        self.overrides.insert(resource.into(), config);
        self
    }

    /// Limit in force for a resource
    #[must_use]
    pub fn config_for(&self, resource: &str) -> &RateLimitConfig {
        self.overrides.get(resource).unwrap_or(&self.default_config)
    }

    /// Admit a request if the window has room (non-blocking)
    pub fn check_and_admit(&self, resource: &str) -> RateLimitResult {
        let bucket = self.bucket(resource);
        let result = lock(&bucket).admit(Instant::now());

        if !result.allowed {
            debug!(
                resource = %resource,
                retry_after_ms = result.retry_after.as_millis() as u64,
                "Rate limit reached"
            );
        }
        result
    }

    /// Admit a request, suspending once for the window to free a slot
    ///
    /// Returns how long the caller was suspended.
    ///
    /// # Errors
    ///
    /// Returns the rejection if the retry after waiting is still denied.
    pub async fn wait_if_needed(&self, resource: &str) -> Result<Duration, RateLimitResult> {
        let first = self.check_and_admit(resource);
        if first.allowed {
            return Ok(Duration::ZERO);
        }

        let delay = first.retry_after;
        debug!(
            resource = %resource,
            delay_ms = delay.as_millis() as u64,
            "Waiting for rate limit window"
        );
        tokio::time::sleep(delay).await;

        let retry = self.check_and_admit(resource);
        if retry.allowed {
            Ok(delay)
        } else {
            Err(retry)
        }
    }

    /// Get current usage for a resource as (counted, max)
    pub fn usage(&self, resource: &str) -> (u32, u32) {
        let max = self.config_for(resource).max_requests;
        match self.buckets.get(resource).map(|b| Arc::clone(&b)) {
            Some(bucket) => {
                let mut bucket = lock(&bucket);
                bucket.evict(Instant::now());
                (bucket.timestamps.len() as u32, max)
            }
            None => (0, max),
        }
    }

    /// Reset rate limit for a resource
    pub fn reset(&self, resource: &str) {
        self.buckets.remove(resource);
    }

    /// Remove buckets with no requests left in their window
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            let mut bucket = lock(bucket);
            bucket.evict(now);
            !bucket.timestamps.is_empty()
        });
        before - self.buckets.len()
    }

    fn bucket(&self, resource: &str) -> Arc<Mutex<Bucket>> {
        if let Some(bucket) = self.buckets.get(resource) {
            return Arc::clone(&bucket);
        }
        let config = self.config_for(resource).clone();
        let bucket = self
            .buckets
            .entry(resource.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Bucket::new(config))));
        Arc::clone(&bucket)
    }
}

fn lock(bucket: &Mutex<Bucket>) -> MutexGuard<'_, Bucket> {
    bucket.lock().unwrap_or_else(|e| e.into_inner())
}

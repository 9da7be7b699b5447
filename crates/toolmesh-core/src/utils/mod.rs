//! Utility modules for toolmesh-core
//!
//! Provides the resilience primitives:
//! - circuit_breaker: Circuit breaker pattern for fault tolerance
//! - rate_limiter: Sliding-window request rate limiting
//! - retry: Retry logic with exponential backoff
//! - metrics: Lightweight metrics collection

mod circuit_breaker;
mod metrics;
mod rate_limiter;
mod retry;

pub use circuit_breaker::{
    BreakerError, BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig,
    CircuitState,
};
pub use metrics::{Counter, LabelKey, LabeledCounter, MetricsSnapshot, ResilienceMetrics};
pub use rate_limiter::{RateLimitConfig, RateLimitResult, RateLimiter};
pub use retry::{RetryError, RetryPolicy};

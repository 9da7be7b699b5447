//! Toolmesh Core - Resilience Primitives
//!
//! Shared building blocks for every tool-serving component:
//! - Error taxonomy and upstream error classification
//! - Configuration validation (fail-fast / fail-soft)
//! - TTL cache with deterministic key building
//! - Utils: circuit breaker, rate limiter, retry with backoff, metrics
//! - Trace context propagation across tasks and process boundaries
//! - Telemetry: isolated, best-effort event broadcast
//! - Pipeline: rate-limit → breaker → retry composition around one call

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config_validator;
pub mod error;
pub mod error_mapper;
pub mod pipeline;
pub mod registry;
pub mod settings;
pub mod telemetry;
pub mod trace;
pub mod utils;

pub use cache::{build_key, TtlCache};
pub use config_validator::{
    resolve, ConfigIssue, ConfigValidationError, IssueCollector, NotConfiguredPayload, Resolution,
    ServiceGate, ValidateConfig, SERVICE_NOT_CONFIGURED,
};
pub use error::{ClassifiedError, Error, ErrorCode, ErrorPayload, Result, UserFriendlyError};
pub use error_mapper::{ErrorMapper, UpstreamError, DEFAULT_RETRY_AFTER_SECS};
pub use pipeline::ResiliencePipeline;
pub use registry::ResilienceRegistry;
pub use settings::{
    BreakerSettings, DependencyOverrides, RateLimitSettings, ResilienceSettings, RetrySettings,
};
pub use telemetry::{ResilienceEvent, TelemetryBus};
pub use trace::{TraceContext, CORRELATION_ID_HEADER, TRACE_ID_HEADER};
pub use utils::{
    BreakerError, BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig,
    CircuitState, Counter, LabeledCounter, MetricsSnapshot, RateLimitConfig, RateLimitResult,
    RateLimiter, ResilienceMetrics, RetryError, RetryPolicy,
};

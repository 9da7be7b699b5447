//! Resilience registry
//!
//! Owns every piece of shared resilience state for one process: breakers,
//! rate-limit buckets, retry policies, the cache, metrics and the telemetry
//! bus. Construct it once at startup and share it behind an `Arc`; tests
//! build their own isolated instance.

use crate::cache::TtlCache;
use crate::config_validator::resolve;
use crate::error::Result;
use crate::settings::ResilienceSettings;
use crate::telemetry::TelemetryBus;
use crate::utils::{
    BreakerRegistry, CircuitBreakerConfig, RateLimitConfig, RateLimiter, ResilienceMetrics,
    RetryPolicy,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;

/// Shared resilience state, injected into pipelines and orchestrators
#[derive(Debug)]
pub struct ResilienceRegistry {
    breakers: BreakerRegistry,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
    retry_overrides: HashMap<String, RetryPolicy>,
    wait_for_rate_limit: bool,
    cache: TtlCache<Value>,
    metrics: ResilienceMetrics,
    telemetry: TelemetryBus,
}

impl Default for ResilienceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResilienceRegistry {
    /// Registry with default breaker, limiter and retry settings
    #[must_use]
    pub fn new() -> Self {
        let telemetry = TelemetryBus::default();
        Self {
            breakers: BreakerRegistry::new(CircuitBreakerConfig::default())
                .with_telemetry(telemetry.clone()),
            rate_limiter: RateLimiter::new(RateLimitConfig::default()),
            retry: RetryPolicy::default(),
            retry_overrides: HashMap::new(),
            wait_for_rate_limit: false,
            cache: TtlCache::new(),
            metrics: ResilienceMetrics::new(),
            telemetry,
        }
    }

    /// Build a registry from validated settings.
    ///
    /// # Errors
    ///
    /// Settings are resolved fail-fast: any critical issue is returned as
    /// [`crate::Error::Config`].
    pub fn from_settings(settings: &ResilienceSettings) -> Result<Self> {
        resolve("resilience", settings, true)?;

        let mut registry = Self::new()
            .with_breaker_config((&settings.circuit_breaker).into())
            .with_rate_limit((&settings.rate_limit).into())
            .with_retry_policy((&settings.retry).into())
            .with_wait_for_rate_limit(settings.rate_limit.wait);

        let mut names: Vec<&String> = settings.overrides.keys().collect();
        names.sort();
        for name in names {
            let overrides = &settings.overrides[name];
            if let Some(breaker) = &overrides.circuit_breaker {
                registry = registry.with_breaker_override(name.as_str(), breaker.into());
            }
            if let Some(rate_limit) = &overrides.rate_limit {
                registry = registry.with_rate_limit_override(name.as_str(), rate_limit.into());
            }
            if let Some(retry) = &overrides.retry {
                registry = registry.with_retry_override(name.as_str(), retry.into());
            }
        }

        info!(
            overrides = settings.overrides.len(),
            wait_for_rate_limit = settings.rate_limit.wait,
            "Resilience registry initialized"
        );
        Ok(registry)
    }

    /// Replace the default breaker configuration.
    ///
    /// Discards breaker overrides, so call before [`Self::with_breaker_override`].
    #[must_use]
    pub fn with_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breakers = BreakerRegistry::new(config).with_telemetry(self.telemetry.clone());
        self
    }

    /// Breaker configuration for one dependency
    #[must_use]
    pub fn with_breaker_override(mut self, dependency: &str, config: CircuitBreakerConfig) -> Self {
        self.breakers = self.breakers.with_override(dependency, config);
        self
    }

    /// Replace the default rate limit.
    ///
    /// Discards rate limit overrides, so call before
    /// [`Self::with_rate_limit_override`].
    #[must_use]
    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limiter = RateLimiter::new(config);
        self
    }

    /// Rate limit for one dependency
    #[must_use]
    pub fn with_rate_limit_override(mut self, dependency: &str, config: RateLimitConfig) -> Self {
        self.rate_limiter = self.rate_limiter.with_override(dependency, config);
        self
    }

    /// Replace the default retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Retry policy for one dependency
    #[must_use]
    pub fn with_retry_override(mut self, dependency: &str, policy: RetryPolicy) -> Self {
        self.retry_overrides.insert(dependency.to_string(), policy);
        self
    }

    /// Suspend on a full rate-limit window instead of rejecting
    #[must_use]
    pub fn with_wait_for_rate_limit(mut self, wait: bool) -> Self {
        self.wait_for_rate_limit = wait;
        self
    }

    /// Per-dependency circuit breakers
    #[must_use]
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    /// Per-dependency rate limiter
    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Retry policy in force for a dependency
    #[must_use]
    pub fn retry_policy(&self, dependency: &str) -> &RetryPolicy {
        self.retry_overrides.get(dependency).unwrap_or(&self.retry)
    }

    /// Whether rate limiting suspends instead of rejecting
    #[must_use]
    pub fn waits_for_rate_limit(&self) -> bool {
        self.wait_for_rate_limit
    }

    /// Shared result cache
    #[must_use]
    pub fn cache(&self) -> &TtlCache<Value> {
        &self.cache
    }

    /// Pipeline counters
    #[must_use]
    pub fn metrics(&self) -> &ResilienceMetrics {
        &self.metrics
    }

    /// Event bus for breaker transitions and call outcomes
    #[must_use]
    pub fn telemetry(&self) -> &TelemetryBus {
        &self.telemetry
    }
}

//! Resilience settings
//!
//! Statically typed, serde-deserialized knobs for the breaker, rate limiter
//! and retry policy, with optional per-dependency overrides.

use crate::config_validator::{ConfigIssue, IssueCollector, ValidateConfig};
use crate::utils::{CircuitBreakerConfig, RateLimitConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Upper bound for breaker timeouts and limiter windows (one day)
pub const MAX_WINDOW_SECS: u64 = 86_400;

/// Upper bound for a single retry backoff (one hour)
pub const MAX_DELAY_MS: u64 = 3_600_000;

/// Top-level resilience configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResilienceSettings {
    /// Default breaker settings
    #[serde(default)]
    pub circuit_breaker: BreakerSettings,
    /// Default rate limit settings
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    /// Default retry settings
    #[serde(default)]
    pub retry: RetrySettings,
    /// Per-dependency overrides, keyed by dependency name
    #[serde(default)]
    pub overrides: HashMap<String, DependencyOverrides>,
}

/// Circuit breaker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Consecutive failures that trip the breaker
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Half-open successes that close the breaker
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// Seconds the breaker stays open before probing
    #[serde(default = "default_breaker_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_breaker_timeout_secs() -> u64 {
    30
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout_secs: default_breaker_timeout_secs(),
        }
    }
}

impl From<&BreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &BreakerSettings) -> Self {
        CircuitBreakerConfig::new()
            .with_failure_threshold(settings.failure_threshold)
            .with_success_threshold(settings.success_threshold)
            .with_timeout(Duration::from_secs(settings.timeout_secs))
    }
}

impl ValidateConfig for BreakerSettings {
    fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = IssueCollector::new();
        issues.require_positive("failure_threshold", u64::from(self.failure_threshold));
        issues.require_positive("success_threshold", u64::from(self.success_threshold));
        issues.require_positive("timeout_secs", self.timeout_secs);
        issues.require_at_most("timeout_secs", self.timeout_secs, MAX_WINDOW_SECS);
        issues.finish()
    }
}

/// Sliding-window rate limit settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Requests admitted per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Suspend until the window frees a slot instead of rejecting
    #[serde(default)]
    pub wait: bool,
}

fn default_max_requests() -> u32 {
    60
}

fn default_window_secs() -> u64 {
    60
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            wait: false,
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        RateLimitConfig::new(settings.max_requests, Duration::from_secs(settings.window_secs))
    }
}

impl ValidateConfig for RateLimitSettings {
    fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = IssueCollector::new();
        issues.require_positive("max_requests", u64::from(self.max_requests));
        issues.require_positive("window_secs", self.window_secs);
        issues.require_at_most("window_secs", self.window_secs, MAX_WINDOW_SECS);
        issues.finish()
    }
}

/// Retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap on a single backoff in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Add random jitter to backoff
    #[serde(default = "default_true")]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: true,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        RetryPolicy::new()
            .with_max_attempts(settings.max_attempts)
            .with_base_delay(Duration::from_millis(settings.base_delay_ms))
            .with_max_delay(Duration::from_millis(settings.max_delay_ms))
            .with_jitter(settings.jitter)
    }
}

impl ValidateConfig for RetrySettings {
    fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = IssueCollector::new();
        issues.require_positive("max_attempts", u64::from(self.max_attempts));
        issues.require_positive("max_delay_ms", self.max_delay_ms);
        issues.require_at_most("max_delay_ms", self.max_delay_ms, MAX_DELAY_MS);
        if self.base_delay_ms > self.max_delay_ms {
            issues.push(ConfigIssue::warning(
                "base_delay_ms",
                format!(
                    "exceeds max_delay_ms ({}), every retry waits the cap",
                    self.max_delay_ms
                ),
            ));
        }
        issues.finish()
    }
}

/// Per-dependency override; unset sections fall back to the defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyOverrides {
    /// Breaker override
    #[serde(default)]
    pub circuit_breaker: Option<BreakerSettings>,
    /// Rate limit override
    #[serde(default)]
    pub rate_limit: Option<RateLimitSettings>,
    /// Retry override
    #[serde(default)]
    pub retry: Option<RetrySettings>,
}

impl ValidateConfig for DependencyOverrides {
    fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = IssueCollector::new();
        if let Some(breaker) = &self.circuit_breaker {
            issues.extend_nested("circuit_breaker", breaker.validate());
        }
        if let Some(rate_limit) = &self.rate_limit {
            issues.extend_nested("rate_limit", rate_limit.validate());
        }
        if let Some(retry) = &self.retry {
            issues.extend_nested("retry", retry.validate());
        }
        issues.finish()
    }
}

impl ValidateConfig for ResilienceSettings {
    fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = IssueCollector::new();
        issues.extend_nested("circuit_breaker", self.circuit_breaker.validate());
        issues.extend_nested("rate_limit", self.rate_limit.validate());
        issues.extend_nested("retry", self.retry.validate());

        let mut names: Vec<&String> = self.overrides.keys().collect();
        names.sort();
        for name in names {
            let prefix = format!("overrides.{}", name);
            issues.extend_nested(&prefix, self.overrides[name].validate());
        }
        issues.finish()
    }
}

#[cfg(test)]
mod tests;

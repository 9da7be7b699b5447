//! Application configuration types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use toolmesh_core::{
    ConfigIssue, IssueCollector, RateLimitSettings, ResilienceSettings, ValidateConfig,
};
use toolmesh_orchestrator::OrchestratorConfig;

/// Longest accepted request or fan-out timeout (one hour)
pub const MAX_TIMEOUT_MS: u64 = 3_600_000;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub resilience: ResilienceSettings,
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    /// Upstream services keyed by name
    #[serde(default)]
    pub services: BTreeMap<String, ServiceSettings>,
}

/// Fan-out limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    #[serde(default = "default_orchestrator_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_orchestrator_timeout_ms() -> u64 {
    10_000
}

fn default_max_depth() -> usize {
    4
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_orchestrator_timeout_ms(),
            max_depth: default_max_depth(),
        }
    }
}

impl From<&OrchestratorSettings> for OrchestratorConfig {
    fn from(settings: &OrchestratorSettings) -> Self {
        OrchestratorConfig::new()
            .with_timeout(Duration::from_millis(settings.timeout_ms))
            .with_max_depth(settings.max_depth)
    }
}

impl ValidateConfig for OrchestratorSettings {
    fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = IssueCollector::new();
        issues.require_positive("timeout_ms", self.timeout_ms);
        issues.require_at_most("timeout_ms", self.timeout_ms, MAX_TIMEOUT_MS);
        issues.require_positive("max_depth", self.max_depth as u64);
        issues.finish()
    }
}

/// One HTTP upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSettings {
    #[serde(default)]
    pub url: Option<String>,
    /// Whether a failure counts toward complete failure of a fan-out
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default = "default_service_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Treat a missing `api_key` as critical
    #[serde(default)]
    pub api_key_required: bool,
    /// Per-service limiter window, replacing the default
    #[serde(default)]
    pub rate_limit: Option<RateLimitSettings>,
}

fn default_required() -> bool {
    true
}

fn default_service_timeout_ms() -> u64 {
    10_000
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            url: None,
            required: default_required(),
            timeout_ms: default_service_timeout_ms(),
            api_key: None,
            api_key_required: false,
            rate_limit: None,
        }
    }
}

impl ServiceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ValidateConfig for ServiceSettings {
    fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = IssueCollector::new();
        issues.require_url("url", self.url.as_deref());
        issues.require_positive("timeout_ms", self.timeout_ms);
        issues.require_at_most("timeout_ms", self.timeout_ms, MAX_TIMEOUT_MS);
        if self.api_key_required {
            issues.require("api_key", self.api_key.as_deref());
        } else {
            issues.recommend(
                "api_key",
                self.api_key.as_deref(),
                "not set, requests will be sent unauthenticated",
            );
        }
        if let Some(limit) = &self.rate_limit {
            issues.extend_nested("rate_limit", limit.validate());
        }
        issues.finish()
    }
}

//! Configuration validation
//!
//! Each service describes its configuration rules by implementing
//! [`ValidateConfig`]. [`resolve`] then applies one of two strategies:
//! - fail-fast: any critical issue aborts with [`ConfigValidationError`]
//! - fail-soft: the service keeps running, and every operation that needs
//!   the missing configuration returns a [`NotConfiguredPayload`]
//!
//! Non-critical issues are warnings only and never block execution.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

/// Error code carried by the fail-soft payload
pub const SERVICE_NOT_CONFIGURED: &str = "SERVICE_NOT_CONFIGURED";

/// Message carried by the fail-soft payload
pub const NOT_CONFIGURED_MESSAGE: &str = "Service configuration is incomplete or invalid.";

/// A single configuration problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIssue {
    /// Offending field
    pub field: String,
    /// What is wrong with it
    pub message: String,
    /// Whether the issue blocks execution (defaults to true)
    #[serde(default = "default_critical")]
    pub critical: bool,
}

fn default_critical() -> bool {
    true
}

impl ConfigIssue {
    /// Create a critical issue
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            critical: true,
        }
    }

    /// Create a non-critical issue
    #[must_use]
    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            critical: false,
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = if self.critical { "critical" } else { "warning" };
        write!(f, "[{}] {}: {}", level, self.field, self.message)
    }
}

/// Fail-fast validation failure, carrying every issue found
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("configuration for '{service}' is invalid: {}", summarize(.issues))]
pub struct ConfigValidationError {
    /// Service whose configuration failed
    pub service: String,
    /// All issues, critical and non-critical
    pub issues: Vec<ConfigIssue>,
}

impl ConfigValidationError {
    /// Number of blocking issues
    #[must_use]
    pub fn critical_count(&self) -> usize {
        self.issues.iter().filter(|i| i.critical).count()
    }
}

fn summarize(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .filter(|i| i.critical)
        .map(|i| format!("{}: {}", i.field, i.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Fail-soft payload returned instead of attempting work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotConfiguredPayload {
    /// Always `SERVICE_NOT_CONFIGURED`
    pub error_code: String,
    /// Human-readable message
    pub message: String,
    /// Full issue list
    pub issues: Vec<ConfigIssue>,
}

impl NotConfiguredPayload {
    /// Build the payload for a set of issues
    #[must_use]
    pub fn new(issues: Vec<ConfigIssue>) -> Self {
        Self {
            error_code: SERVICE_NOT_CONFIGURED.to_string(),
            message: NOT_CONFIGURED_MESSAGE.to_string(),
            issues,
        }
    }
}

/// Per-service configuration rules
pub trait ValidateConfig {
    /// Enumerate every problem with this configuration
    fn validate(&self) -> Vec<ConfigIssue>;
}

/// Outcome of a non-raising resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No critical issues
    Ready,
    /// Critical issues found in fail-soft mode
    NotConfigured(NotConfiguredPayload),
}

impl Resolution {
    /// Whether the service may do work
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Fail-soft payload, if not ready
    #[must_use]
    pub fn payload(&self) -> Option<&NotConfiguredPayload> {
        match self {
            Self::Ready => None,
            Self::NotConfigured(payload) => Some(payload),
        }
    }
}

/// Validate a service configuration and apply the chosen strategy
///
/// # Errors
///
/// Returns [`ConfigValidationError`] when `fail_fast` is set and any
/// critical issue exists.
pub fn resolve<C: ValidateConfig + ?Sized>(
    service: &str,
    config: &C,
    fail_fast: bool,
) -> Result<Resolution, ConfigValidationError> {
    let issues = config.validate();

    for issue in issues.iter().filter(|i| !i.critical) {
        warn!(service = %service, field = %issue.field, "{}", issue.message);
    }

    if !issues.iter().any(|i| i.critical) {
        return Ok(Resolution::Ready);
    }

    if fail_fast {
        error!(
            service = %service,
            issues = issues.len(),
            "Configuration invalid, aborting startup"
        );
        return Err(ConfigValidationError {
            service: service.to_string(),
            issues,
        });
    }

    warn!(
        service = %service,
        "Configuration incomplete, service will report SERVICE_NOT_CONFIGURED"
    );
    Ok(Resolution::NotConfigured(NotConfiguredPayload::new(issues)))
}

/// Accumulates issues while walking a configuration struct
#[derive(Debug, Default)]
pub struct IssueCollector {
    issues: Vec<ConfigIssue>,
}

impl IssueCollector {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an issue
    pub fn push(&mut self, issue: ConfigIssue) {
        self.issues.push(issue);
    }

    /// Require a non-blank string
    pub fn require(&mut self, field: &str, value: Option<&str>) {
        if value.map_or(true, |v| v.trim().is_empty()) {
            self.push(ConfigIssue::new(field, "is required"));
        }
    }

    /// Require an absolute http(s) URL
    pub fn require_url(&mut self, field: &str, value: Option<&str>) {
        match value.map(str::trim) {
            None | Some("") => self.push(ConfigIssue::new(field, "is required")),
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                self.push(ConfigIssue::new(
                    field,
                    format!("must be an http(s) URL, got '{}'", url),
                ));
            }
            Some(_) => {}
        }
    }

    /// Require a value strictly greater than zero
    pub fn require_positive(&mut self, field: &str, value: u64) {
        if value == 0 {
            self.push(ConfigIssue::new(field, "must be greater than zero"));
        }
    }

    /// Reject a value above `max`
    pub fn require_at_most(&mut self, field: &str, value: u64, max: u64) {
        if value > max {
            self.push(ConfigIssue::new(
                field,
                format!("must be at most {}, got {}", max, value),
            ));
        }
    }

    /// Warn when an optional string is missing
    pub fn recommend(&mut self, field: &str, value: Option<&str>, message: &str) {
        if value.map_or(true, |v| v.trim().is_empty()) {
            self.push(ConfigIssue::warning(field, message));
        }
    }

    /// Prefix every collected field, for nested structs
    pub fn extend_nested(&mut self, prefix: &str, nested: Vec<ConfigIssue>) {
        self.issues.extend(nested.into_iter().map(|mut issue| {
            issue.field = format!("{}.{}", prefix, issue.field);
            issue
        }));
    }

    /// Finish collecting
    #[must_use]
    pub fn finish(self) -> Vec<ConfigIssue> {
        self.issues
    }
}

/// Holds the resolved configuration state of one service
///
/// Operations consult [`ServiceGate::check`] before doing work so a
/// fail-soft service short-circuits with the exact payload.
#[derive(Debug, Clone)]
pub struct ServiceGate {
    service: String,
    resolution: Resolution,
}

impl ServiceGate {
    /// Resolve a configuration into a gate
    ///
    /// # Errors
    ///
    /// Propagates fail-fast validation failures.
    pub fn new<C: ValidateConfig + ?Sized>(
        service: impl Into<String>,
        config: &C,
        fail_fast: bool,
    ) -> Result<Self, ConfigValidationError> {
        let service = service.into();
        let resolution = resolve(&service, config, fail_fast)?;
        Ok(Self {
            service,
            resolution,
        })
    }

    /// Service name
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Whether the service may do work
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.resolution.is_ready()
    }

    /// Ok if ready, otherwise the fail-soft payload
    ///
    /// # Errors
    ///
    /// Returns the stored [`NotConfiguredPayload`] when the service is not ready.
    pub fn check(&self) -> Result<(), NotConfiguredPayload> {
        match &self.resolution {
            Resolution::Ready => Ok(()),
            Resolution::NotConfigured(payload) => Err(payload.clone()),
        }
    }
}

#[cfg(test)]
mod tests;

//! Error types for toolmesh-core
//!
//! This module provides the closed error taxonomy surfaced to every caller,
//! the standard error payload, and user-friendly error formatting.

use crate::config_validator::ConfigValidationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Base URL for per-code error documentation
pub const DOCS_BASE_URL: &str = "https://docs.toolmesh.dev/errors";

/// Closed set of error kinds surfaced by this core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Dependency down, 5xx, timeout, connection error
    UpstreamUnavailable,
    /// Invalid arguments, 4xx other than 404/429
    BadRequest,
    /// 429 or internal limiter rejection
    RateLimited,
    /// Resource absent (404)
    NotFound,
    /// Breaker is open; the call was never attempted
    CircuitBreakerOpen,
    /// Fail-soft configuration gap
    ServiceNotConfigured,
    /// Anything unclassified
    InternalError,
}

impl ErrorCode {
    /// Wire name of the code
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            Self::BadRequest => "BAD_REQUEST",
            Self::RateLimited => "RATE_LIMITED",
            Self::NotFound => "NOT_FOUND",
            Self::CircuitBreakerOpen => "CIRCUIT_BREAKER_OPEN",
            Self::ServiceNotConfigured => "SERVICE_NOT_CONFIGURED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether a retry policy may recover this error locally
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable | Self::RateLimited)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure classified into the closed taxonomy
///
/// Serializes as the inner `error` object of the standard error payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct ClassifiedError {
    /// Taxonomy kind
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional structured context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Seconds the caller should wait before retrying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// Link to documentation for this error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,
}

impl ClassifiedError {
    /// Create a classified error with no extra context
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            retry_after: None,
            docs_url: None,
        }
    }

    /// Attach structured details
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach a retry-after hint in seconds
    #[must_use]
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Attach a documentation link
    #[must_use]
    pub fn with_docs_url(mut self, url: impl Into<String>) -> Self {
        self.docs_url = Some(url.into());
        self
    }

    /// Rejection by an open circuit breaker
    #[must_use]
    pub fn circuit_open(dependency: &str, remaining: Duration) -> Self {
        Self::new(
            ErrorCode::CircuitBreakerOpen,
            format!("Circuit breaker for '{}' is open", dependency),
        )
        .with_details(serde_json::json!({ "dependency": dependency }))
        .with_retry_after(ceil_secs(remaining))
    }

    /// Rejection by the local rate limiter
    #[must_use]
    pub fn rate_limited(resource: &str, retry_after: Duration) -> Self {
        Self::new(
            ErrorCode::RateLimited,
            format!("Rate limit exceeded for '{}'", resource),
        )
        .with_details(serde_json::json!({ "resource": resource }))
        .with_retry_after(ceil_secs(retry_after).max(1))
    }

    /// Whether a retry policy may recover this error locally
    #[must_use]
    pub fn retryable(&self) -> bool {
        self.code.retryable()
    }

    /// Wrap into the standard `{"error": {...}}` envelope
    #[must_use]
    pub fn into_payload(self) -> ErrorPayload {
        ErrorPayload { error: self }
    }
}

/// Standard error payload returned by any failing operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// The classified error
    pub error: ClassifiedError,
}

impl From<ClassifiedError> for ErrorPayload {
    fn from(error: ClassifiedError) -> Self {
        error.into_payload()
    }
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration failed fail-fast validation
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigValidationError),

    /// A classified upstream or resilience failure
    #[error("{0}")]
    Classified(#[from] ClassifiedError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for user-friendly error messages
///
/// Provides human-readable error messages, suggestions for fixing,
/// and links to documentation.
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;

    /// Get a documentation URL for more information
    fn docs_url(&self) -> Option<String>;
}

impl UserFriendlyError for ClassifiedError {
    fn user_message(&self) -> String {
        match (self.code, self.retry_after) {
            (ErrorCode::RateLimited, Some(secs)) => {
                format!("{} Please wait {} seconds.", self.message, secs)
            }
            (ErrorCode::CircuitBreakerOpen, Some(secs)) => {
                format!("{}. Retry in {} seconds.", self.message, secs)
            }
            _ => self.message.clone(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self.code {
            ErrorCode::UpstreamUnavailable => {
                Some("The upstream service is unreachable; try again shortly.".to_string())
            }
            ErrorCode::BadRequest => Some("Check the request arguments.".to_string()),
            ErrorCode::ServiceNotConfigured => {
                Some("An operator must complete the service configuration.".to_string())
            }
            ErrorCode::CircuitBreakerOpen | ErrorCode::RateLimited => {
                Some("Back off before retrying.".to_string())
            }
            ErrorCode::NotFound | ErrorCode::InternalError => None,
        }
    }

    fn docs_url(&self) -> Option<String> {
        self.docs_url.clone().or_else(|| {
            Some(format!(
                "{}/{}",
                DOCS_BASE_URL,
                self.code.as_str().to_lowercase().replace('_', "-")
            ))
        })
    }
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::Config(e) => format!("Configuration error: {}", e),
            Error::Classified(e) => e.user_message(),
            Error::Serialization(e) => format!("Serialization error: {}", e),
            Error::Internal(msg) => format!("Internal error: {}", msg),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::Config(e) => Some(format!(
                "Fix the {} critical issue(s) reported for '{}'.",
                e.critical_count(),
                e.service
            )),
            Error::Classified(e) => e.suggestion(),
            _ => None,
        }
    }

    fn docs_url(&self) -> Option<String> {
        match self {
            Error::Config(_) => Some("https://docs.toolmesh.dev/configuration".to_string()),
            Error::Classified(e) => e.docs_url(),
            _ => None,
        }
    }
}

/// Whole seconds, rounded up
pub(crate) fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests;

//! Upstream error classification
//!
//! Maps raw collaborator failures into the closed [`ErrorCode`] taxonomy.
//! Classification is pure: it never logs and never touches breaker or
//! limiter state.

use crate::config_validator::NotConfiguredPayload;
use crate::error::{ClassifiedError, ErrorCode};
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Retry-after used for rate limits that do not advertise one
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Longest upstream body excerpt carried into error details
const BODY_EXCERPT_LEN: usize = 512;

/// Raw failure reported by an external collaborator
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Non-success HTTP response
    #[error("upstream returned HTTP {status}")]
    Http {
        /// Status code
        status: u16,
        /// Parsed `Retry-After` header, in seconds
        retry_after: Option<u64>,
        /// Response body, if any
        body: Option<String>,
    },

    /// The call did not complete in time
    #[error("upstream timed out")]
    Timeout {
        /// Timeout that fired, if known
        after: Option<Duration>,
    },

    /// Connection refused or reset
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Host name could not be resolved
    #[error("DNS resolution failed: {0}")]
    Dns(String),

    /// Collaborator signalled a missing resource without HTTP
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Collaborator signalled a rate limit without HTTP
    #[error("rate limited by upstream")]
    RateLimited {
        /// Seconds to wait, if advertised
        retry_after: Option<u64>,
    },

    /// Arguments rejected before reaching the upstream
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Service short-circuited by a fail-soft configuration gap
    #[error("service not configured")]
    NotConfigured(NotConfiguredPayload),

    /// Failure that was already classified (e.g. from a nested orchestration)
    #[error("{0}")]
    Classified(ClassifiedError),

    /// Programming error, type mismatch, or anything else
    #[error("internal error: {0}")]
    Internal(String),
}

/// Classifies raw upstream failures
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorMapper;

impl ErrorMapper {
    /// Classify a raw failure
    ///
    /// Rules are checked in order: not-found, rate-limit, other 4xx,
    /// unavailability (5xx, refused, DNS, timeout), then everything else.
    #[must_use]
    pub fn map(raw: &UpstreamError) -> ClassifiedError {
        match raw {
            UpstreamError::Classified(e) => e.clone(),
            UpstreamError::NotConfigured(payload) => {
                ClassifiedError::new(ErrorCode::ServiceNotConfigured, payload.message.clone())
                    .with_details(
                        serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
                    )
            }

            // 1. Not found
            UpstreamError::Http { status: 404, body, .. } => {
                ClassifiedError::new(ErrorCode::NotFound, "Upstream resource not found")
                    .with_details(http_details(404, body.as_deref()))
            }
            UpstreamError::NotFound(resource) => ClassifiedError::new(
                ErrorCode::NotFound,
                format!("Resource not found: {}", resource),
            )
            .with_details(serde_json::json!({ "resource": resource })),

            // 2. Rate limited
            UpstreamError::Http {
                status: 429,
                retry_after,
                body,
            } => ClassifiedError::new(ErrorCode::RateLimited, "Upstream rate limit exceeded")
                .with_details(http_details(429, body.as_deref()))
                .with_retry_after(retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS)),
            UpstreamError::RateLimited { retry_after } => {
                ClassifiedError::new(ErrorCode::RateLimited, "Upstream rate limit exceeded")
                    .with_retry_after(retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS))
            }

            // 3. Other client errors
            UpstreamError::Http { status, body, .. } if (400..500).contains(status) => {
                ClassifiedError::new(
                    ErrorCode::BadRequest,
                    format!("Upstream rejected the request (HTTP {})", status),
                )
                .with_details(http_details(*status, body.as_deref()))
            }
            UpstreamError::InvalidArguments(msg) => {
                ClassifiedError::new(ErrorCode::BadRequest, format!("Invalid arguments: {}", msg))
            }

            // 4. Unavailable
            UpstreamError::Http { status, body, .. } if (500..600).contains(status) => {
                ClassifiedError::new(
                    ErrorCode::UpstreamUnavailable,
                    format!("Upstream unavailable (HTTP {})", status),
                )
                .with_details(http_details(*status, body.as_deref()))
            }
            UpstreamError::Timeout { after } => {
                let err =
                    ClassifiedError::new(ErrorCode::UpstreamUnavailable, "Upstream timed out");
                match after {
                    Some(after) => err.with_details(serde_json::json!({
                        "timeout_ms": after.as_millis() as u64
                    })),
                    None => err,
                }
            }
            UpstreamError::ConnectionRefused(msg) => ClassifiedError::new(
                ErrorCode::UpstreamUnavailable,
                format!("Connection refused: {}", msg),
            ),
            UpstreamError::Dns(msg) => ClassifiedError::new(
                ErrorCode::UpstreamUnavailable,
                format!("DNS resolution failed: {}", msg),
            ),

            // 5. Everything else
            UpstreamError::Http { status, body, .. } => ClassifiedError::new(
                ErrorCode::InternalError,
                format!("Unexpected upstream status {}", status),
            )
            .with_details(http_details(*status, body.as_deref())),
            UpstreamError::Internal(msg) => {
                ClassifiedError::new(ErrorCode::InternalError, msg.clone())
            }
        }
    }
}

impl From<UpstreamError> for ClassifiedError {
    fn from(raw: UpstreamError) -> Self {
        ErrorMapper::map(&raw)
    }
}

impl From<ClassifiedError> for UpstreamError {
    fn from(err: ClassifiedError) -> Self {
        UpstreamError::Classified(err)
    }
}

/// Parse a `Retry-After` header value into whole seconds
///
/// Accepts either delta-seconds or an HTTP date, measured against `now`.
/// Dates in the past yield zero.
#[must_use]
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = at.with_timezone(&Utc) - now;
    Some(delta.num_seconds().max(0) as u64)
}

fn http_details(status: u16, body: Option<&str>) -> serde_json::Value {
    match body {
        Some(body) if !body.is_empty() => {
            let excerpt: String = body.chars().take(BODY_EXCERPT_LEN).collect();
            serde_json::json!({ "status": status, "body": excerpt })
        }
        _ => serde_json::json!({ "status": status }),
    }
}

//! Trace context propagation
//!
//! A [`TraceContext`] is created once per inbound request and never mutated.
//! Within a process it travels through task-local scope; across processes it
//! travels as the `X-Trace-Id` / `X-Correlation-Id` header pair.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tracing::{info_span, Span};
use uuid::Uuid;

/// Outbound/inbound header carrying the trace identifier
pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

/// Outbound/inbound header carrying the correlation identifier
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";

tokio::task_local! {
    static CURRENT: TraceContext;
}

/// Trace and correlation identifiers for one logical request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceContext {
    trace_id: String,
    correlation_id: String,
}

impl TraceContext {
    /// Fresh identifiers for a new top-level request
    #[must_use]
    pub fn new() -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    /// Continue an existing trace
    #[must_use]
    pub fn from_parts(trace_id: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            correlation_id: correlation_id.into(),
        }
    }

    /// Trace identifier, stable across the whole fan-out
    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Correlation identifier, unique per top-level request
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Header pairs to inject on an outbound call
    #[must_use]
    pub fn headers(&self) -> [(&'static str, String); 2] {
        [
            (TRACE_ID_HEADER, self.trace_id.clone()),
            (CORRELATION_ID_HEADER, self.correlation_id.clone()),
        ]
    }

    /// Extract a context from inbound headers.
    ///
    /// Header names match case-insensitively. A missing or blank header gets
    /// a freshly generated identifier.
    pub fn from_headers<I, K, V>(headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut trace_id = None;
        let mut correlation_id = None;

        for (name, value) in headers {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            let name = name.as_ref();
            if name.eq_ignore_ascii_case(TRACE_ID_HEADER) {
                trace_id = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(CORRELATION_ID_HEADER) {
                correlation_id = Some(value.to_string());
            }
        }

        Self {
            trace_id: trace_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            correlation_id: correlation_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        }
    }

    /// Run `fut` with this context as the task's current trace
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }

    /// The context of the enclosing [`TraceContext::scope`], if any
    #[must_use]
    pub fn current() -> Option<Self> {
        CURRENT.try_with(Clone::clone).ok()
    }

    /// The current context, or a fresh one outside any scope
    #[must_use]
    pub fn current_or_new() -> Self {
        Self::current().unwrap_or_default()
    }

    /// A tracing span tagged with both identifiers
    #[must_use]
    pub fn span(&self) -> Span {
        info_span!(
            "trace",
            trace_id = %self.trace_id,
            correlation_id = %self.correlation_id
        )
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.trace_id, self.correlation_id)
    }
}

#[cfg(test)]
mod tests;

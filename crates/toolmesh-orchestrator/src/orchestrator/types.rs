//! Orchestration types

use crate::invoker::Invoke;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use toolmesh_core::{ClassifiedError, TraceContext, UpstreamError};

/// Zero-argument invocation, called once per attempt
pub type Invocation =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Value, UpstreamError>> + Send + Sync>;

/// One named call in a fan-out
#[derive(Clone)]
pub struct SubCall {
    dependency: String,
    invocation: Invocation,
    required: bool,
    cache: Option<(String, Duration)>,
}

impl SubCall {
    /// Sub-call against `dependency`
    pub fn new<F, Fut>(dependency: impl Into<String>, required: bool, invocation: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, UpstreamError>> + Send + 'static,
    {
        Self {
            dependency: dependency.into(),
            invocation: Arc::new(move || invocation().boxed()),
            required,
            cache: None,
        }
    }

    /// A sub-call whose failure counts toward complete failure
    pub fn required<F, Fut>(dependency: impl Into<String>, invocation: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, UpstreamError>> + Send + 'static,
    {
        Self::new(dependency, true, invocation)
    }

    /// A sub-call whose failure only leaves a gap in the result
    pub fn optional<F, Fut>(dependency: impl Into<String>, invocation: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, UpstreamError>> + Send + 'static,
    {
        Self::new(dependency, false, invocation)
    }

    /// Invoke a collaborator with fixed arguments
    pub fn from_invoker(
        dependency: impl Into<String>,
        invoker: Arc<dyn Invoke>,
        args: Value,
        required: bool,
    ) -> Self {
        Self::new(dependency, required, move || {
            let invoker = Arc::clone(&invoker);
            let args = args.clone();
            async move { invoker.invoke(args).await }
        })
    }

    /// Memoize a successful result under `key` for `ttl`
    #[must_use]
    pub fn cached(mut self, key: impl Into<String>, ttl: Duration) -> Self {
        self.cache = Some((key.into(), ttl));
        self
    }

    /// Dependency name used for breaker, limiter and retry lookup
    #[must_use]
    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// Whether a failure counts toward complete failure
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    pub(crate) fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub(crate) fn cache(&self) -> Option<&(String, Duration)> {
        self.cache.as_ref()
    }
}

impl std::fmt::Debug for SubCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubCall")
            .field("dependency", &self.dependency)
            .field("required", &self.required)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Settled outcome of one sub-call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubCallOutcome {
    /// The call produced a payload
    Success {
        /// Upstream payload
        data: Value,
    },
    /// The call failed with a classified error
    Failure {
        /// Classified error
        error: ClassifiedError,
    },
}

/// One slot of an orchestration result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubCallResult {
    /// Dependency the call ran against
    pub dependency: String,
    /// Whether the sub-call was required
    pub required: bool,
    /// Success payload or classified error
    #[serde(flatten)]
    pub outcome: SubCallOutcome,
}

impl SubCallResult {
    pub(crate) fn new(
        dependency: String,
        required: bool,
        result: Result<Value, ClassifiedError>,
    ) -> Self {
        let outcome = match result {
            Ok(data) => SubCallOutcome::Success { data },
            Err(error) => SubCallOutcome::Failure { error },
        };
        Self {
            dependency,
            required,
            outcome,
        }
    }

    /// Whether the call succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SubCallOutcome::Success { .. })
    }

    /// Success payload, if any
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        match &self.outcome {
            SubCallOutcome::Success { data } => Some(data),
            SubCallOutcome::Failure { .. } => None,
        }
    }

    /// Classified error, if any
    #[must_use]
    pub fn error(&self) -> Option<&ClassifiedError> {
        match &self.outcome {
            SubCallOutcome::Failure { error } => Some(error),
            SubCallOutcome::Success { .. } => None,
        }
    }
}

/// Aggregated, immutable outcome of one fan-out
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestrationResult {
    pub(crate) trace_id: String,
    pub(crate) correlation_id: String,
    pub(crate) results: BTreeMap<String, SubCallResult>,
    pub(crate) partial: bool,
    pub(crate) complete_failure: bool,
    pub(crate) elapsed_ms: u64,
}

impl OrchestrationResult {
    /// Trace identifier shared by every sub-call
    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Correlation identifier of the top-level request
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// The trace context the orchestration ran under
    #[must_use]
    pub fn trace(&self) -> TraceContext {
        TraceContext::from_parts(self.trace_id.clone(), self.correlation_id.clone())
    }

    /// Every slot, keyed by sub-call name
    #[must_use]
    pub fn results(&self) -> &BTreeMap<String, SubCallResult> {
        &self.results
    }

    /// One slot by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SubCallResult> {
        self.results.get(name)
    }

    /// At least one required call failed while another call succeeded
    #[must_use]
    pub fn partial(&self) -> bool {
        self.partial
    }

    /// Every required call failed
    #[must_use]
    pub fn complete_failure(&self) -> bool {
        self.complete_failure
    }

    /// Wall time of the fan-out
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Names of failed slots
    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|(_, r)| !r.is_success())
            .map(|(name, _)| name.as_str())
    }

    /// Names of successful slots
    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|(_, r)| r.is_success())
            .map(|(name, _)| name.as_str())
    }
}

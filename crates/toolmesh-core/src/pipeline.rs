//! Resilience pipeline
//!
//! Wraps one upstream call as rate-limit → breaker → retry → innermost call.
//! Every raw failure is classified by the [`ErrorMapper`] before the retry
//! predicate and the breaker see it.

use crate::error::{ClassifiedError, ErrorCode};
use crate::error_mapper::{ErrorMapper, UpstreamError};
use crate::registry::ResilienceRegistry;
use crate::telemetry::ResilienceEvent;
use crate::trace::TraceContext;
use crate::utils::{BreakerError, RetryError};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error};

/// Composes the registry's primitives around individual calls
#[derive(Debug, Clone)]
pub struct ResiliencePipeline {
    registry: Arc<ResilienceRegistry>,
}

impl ResiliencePipeline {
    /// Create a pipeline over a shared registry
    #[must_use]
    pub fn new(registry: Arc<ResilienceRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this pipeline draws state from
    #[must_use]
    pub fn registry(&self) -> &Arc<ResilienceRegistry> {
        &self.registry
    }

    /// Run `operation` against `dependency` with full resilience wrapping.
    ///
    /// `operation` is invoked once per attempt.
    ///
    /// # Errors
    ///
    /// Returns the classified error of the final attempt, `RATE_LIMITED`
    /// when the local limiter rejects, or `CIRCUIT_BREAKER_OPEN` when the
    /// breaker rejects without invoking.
    ///
    /// An upstream `RATE_LIMITED` whose hint exceeds the policy's
    /// `max_delay` is returned without retrying, including the 60s default
    /// applied when the response had no `Retry-After`.
    pub async fn call<T, F, Fut>(
        &self,
        dependency: &str,
        mut operation: F,
    ) -> Result<T, ClassifiedError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let started = Instant::now();

        if let Err(rejected) = self.admit(dependency).await {
            self.settle(dependency, Some(&rejected), 0, started);
            return Err(rejected);
        }

        let breaker = self.registry.breakers().get(dependency);
        let retry = self.registry.retry_policy(dependency);
        let max_delay = retry.max_delay;
        let attempts = AtomicU32::new(0);

        let attempt = || {
            attempts.fetch_add(1, Ordering::Relaxed);
            let call = operation();
            async move { call.await.map_err(|raw| ErrorMapper::map(&raw)) }
        };

        let outcome = breaker
            .call_with(
                || {
                    retry.execute_with_hint(
                        attempt,
                        |err: &ClassifiedError| should_retry(err, max_delay),
                        |err: &ClassifiedError| err.retry_after.map(Duration::from_secs),
                    )
                },
                |err: &RetryError<ClassifiedError>| counts_as_breaker_failure(&err.last_error),
            )
            .await;

        let attempts = attempts.load(Ordering::Relaxed);
        let result = match outcome {
            Ok(value) => Ok(value),
            Err(BreakerError::Open { remaining, .. }) => {
                self.registry
                    .metrics()
                    .breaker_rejections
                    .inc(&[("dependency", dependency)]);
                Err(ClassifiedError::circuit_open(dependency, remaining))
            }
            Err(BreakerError::Inner(err)) => Err(err.into_inner()),
        };

        self.settle(dependency, result.as_ref().err(), attempts, started);
        result
    }

    /// Like [`Self::call`], memoizing successful results in the registry cache
    ///
    /// # Errors
    ///
    /// Same as [`Self::call`]; failures are never cached.
    pub async fn call_cached<F, Fut>(
        &self,
        dependency: &str,
        key: &str,
        ttl: Duration,
        operation: F,
    ) -> Result<Value, ClassifiedError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Value, UpstreamError>>,
    {
        self.registry
            .cache()
            .get_or_compute(key, ttl, || self.call(dependency, operation))
            .await
    }

    async fn admit(&self, dependency: &str) -> Result<(), ClassifiedError> {
        let limiter = self.registry.rate_limiter();
        let rejected = if self.registry.waits_for_rate_limit() {
            limiter.wait_if_needed(dependency).await.err()
        } else {
            let result = limiter.check_and_admit(dependency);
            (!result.allowed).then_some(result)
        };

        match rejected {
            None => Ok(()),
            Some(result) => {
                self.registry
                    .metrics()
                    .rate_limit_rejections
                    .inc(&[("dependency", dependency)]);
                self.registry.telemetry().publish(ResilienceEvent::rate_limited(
                    dependency,
                    result.retry_after.as_millis() as u64,
                ));
                Err(ClassifiedError::rate_limited(dependency, result.retry_after))
            }
        }
    }

    fn settle(
        &self,
        dependency: &str,
        error: Option<&ClassifiedError>,
        attempts: u32,
        started: Instant,
    ) {
        let metrics = self.registry.metrics();
        let outcome = error.map_or("ok", |e| e.code.as_str());
        metrics.record_call(dependency, outcome);
        if attempts > 1 {
            metrics
                .retries
                .inc_by(&[("dependency", dependency)], u64::from(attempts - 1));
        }

        let trace_id = TraceContext::current().map(|ctx| ctx.trace_id().to_string());
        if let Some(err) = error.filter(|e| e.code == ErrorCode::InternalError) {
            error!(
                dependency = %dependency,
                trace_id = ?trace_id,
                attempts = attempts,
                details = ?err.details,
                "Unclassified upstream failure: {}",
                err.message
            );
        } else {
            debug!(
                dependency = %dependency,
                outcome = outcome,
                attempts = attempts,
                "Call settled"
            );
        }

        self.registry.telemetry().publish(ResilienceEvent::CallCompleted {
            dependency: dependency.to_string(),
            outcome: error.map(|e| e.code),
            attempts,
            duration_ms: started.elapsed().as_millis() as u64,
            trace_id,
        });
    }
}

/// Transient codes retry, except a rate limit asking for longer than the cap.
///
/// A 429 without `Retry-After` carries [`DEFAULT_RETRY_AFTER_SECS`], so under
/// the default 10s `max_delay` it is surfaced after one attempt. Raise
/// `max_delay` to at least that default to wait it out.
///
/// [`DEFAULT_RETRY_AFTER_SECS`]: crate::DEFAULT_RETRY_AFTER_SECS
fn should_retry(err: &ClassifiedError, max_delay: Duration) -> bool {
    if !err.retryable() {
        return false;
    }
    match (err.code, err.retry_after) {
        (ErrorCode::RateLimited, Some(secs)) => Duration::from_secs(secs) <= max_delay,
        _ => true,
    }
}

/// Client errors prove the dependency answered; they do not trip the breaker
fn counts_as_breaker_failure(err: &ClassifiedError) -> bool {
    matches!(
        err.code,
        ErrorCode::UpstreamUnavailable | ErrorCode::RateLimited | ErrorCode::InternalError
    )
}

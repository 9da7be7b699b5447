//! Orchestrator core
//!
//! Dispatches every sub-call as its own task, waits for all of them or the
//! global deadline, and aggregates the outcomes. A run never fails as a
//! whole: every problem lands in a sub-call slot.

use super::config::OrchestratorConfig;
use super::result_builder::build_result;
use super::types::{OrchestrationResult, SubCall, SubCallResult};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use toolmesh_core::{
    ClassifiedError, ErrorCode, ResilienceEvent, ResiliencePipeline, ResilienceRegistry,
    TraceContext,
};
use tracing::{error, info, info_span, warn, Instrument};

tokio::task_local! {
    /// Nesting level of the orchestration a task runs under
    static DEPTH: usize;
}

/// Composes independent resilient calls into one aggregated result
#[derive(Debug, Clone)]
pub struct Orchestrator {
    pipeline: ResiliencePipeline,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator over a shared registry
    #[must_use]
    pub fn new(registry: Arc<ResilienceRegistry>, config: OrchestratorConfig) -> Self {
        Self {
            pipeline: ResiliencePipeline::new(registry),
            config,
        }
    }

    /// Create an orchestrator with default configuration
    #[must_use]
    pub fn with_defaults(registry: Arc<ResilienceRegistry>) -> Self {
        Self::new(registry, OrchestratorConfig::default())
    }

    /// Shared resilience state
    #[must_use]
    pub fn registry(&self) -> &Arc<ResilienceRegistry> {
        self.pipeline.registry()
    }

    /// Orchestrator configuration
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run every sub-call concurrently and aggregate the outcomes.
    ///
    /// Without an explicit `trace`, the enclosing trace scope is continued,
    /// or a fresh context is created.
    pub async fn run<I, K>(&self, subcalls: I, trace: Option<TraceContext>) -> OrchestrationResult
    where
        I: IntoIterator<Item = (K, SubCall)>,
        K: Into<String>,
    {
        let trace = trace
            .or_else(TraceContext::current)
            .unwrap_or_default();
        let subcalls: BTreeMap<String, SubCall> = subcalls
            .into_iter()
            .map(|(name, call)| (name.into(), call))
            .collect();
        let depth = DEPTH.try_with(|d| *d).unwrap_or(0);

        let span = info_span!(
            "orchestration",
            trace_id = %trace.trace_id(),
            correlation_id = %trace.correlation_id(),
            subcalls = subcalls.len(),
            depth = depth
        );

        self.run_inner(subcalls, trace, depth)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        subcalls: BTreeMap<String, SubCall>,
        trace: TraceContext,
        depth: usize,
    ) -> OrchestrationResult {
        let started = Instant::now();

        let results = if depth >= self.config.max_depth {
            error!(
                depth = depth,
                max_depth = self.config.max_depth,
                "Orchestration depth limit exceeded, not dispatching"
            );
            depth_exceeded(subcalls, depth, self.config.max_depth)
        } else {
            // None: the timeout is past the clock's range, wait for every task
            let deadline = started.checked_add(self.config.timeout);
            let pending = self.dispatch(subcalls, &trace, depth + 1);
            self.collect(pending, deadline).await
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let result = build_result(&trace, results, elapsed_ms);
        let failed = result.failed().count();

        info!(
            total = result.results().len(),
            failed = failed,
            partial = result.partial(),
            complete_failure = result.complete_failure(),
            elapsed_ms = elapsed_ms,
            "Orchestration completed"
        );
        self.registry()
            .telemetry()
            .publish(ResilienceEvent::OrchestrationCompleted {
                trace_id: result.trace_id().to_string(),
                correlation_id: result.correlation_id().to_string(),
                total: result.results().len(),
                failed,
                partial: result.partial(),
                complete_failure: result.complete_failure(),
                duration_ms: elapsed_ms,
            });

        result
    }

    /// Spawn one task per sub-call, each under the trace and nesting scopes
    fn dispatch(
        &self,
        subcalls: BTreeMap<String, SubCall>,
        trace: &TraceContext,
        child_depth: usize,
    ) -> Vec<Pending> {
        subcalls
            .into_iter()
            .map(|(name, call)| {
                let pipeline = self.pipeline.clone();
                let dependency = call.dependency().to_string();
                let required = call.is_required();
                let span = info_span!("subcall", name = %name, dependency = %dependency);

                let task = trace.clone().scope(async move { execute(&pipeline, &call).await });
                let handle = tokio::spawn(DEPTH.scope(child_depth, task).instrument(span));

                Pending {
                    name,
                    dependency,
                    required,
                    handle,
                }
            })
            .collect()
    }

    /// Await every task until the shared deadline
    async fn collect(
        &self,
        pending: Vec<Pending>,
        deadline: Option<Instant>,
    ) -> BTreeMap<String, SubCallResult> {
        let mut results = BTreeMap::new();
        for task in pending {
            let settled = match deadline {
                Some(deadline) => timeout_at(deadline, task.handle).await,
                None => Ok(task.handle.await),
            };
            let outcome = match settled {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(join_error)) => {
                    error!(name = %task.name, error = %join_error, "Sub-call task failed");
                    Err(ClassifiedError::new(
                        ErrorCode::InternalError,
                        format!("Sub-call '{}' aborted unexpectedly", task.name),
                    ))
                }
                // dropping the handle detaches the task; in-flight work runs to completion
                Err(_) => {
                    warn!(
                        name = %task.name,
                        dependency = %task.dependency,
                        timeout_ms = self.config.timeout.as_millis() as u64,
                        "Sub-call still pending at orchestration deadline"
                    );
                    Err(ClassifiedError::new(
                        ErrorCode::UpstreamUnavailable,
                        format!(
                            "'{}' did not respond before the orchestration deadline",
                            task.dependency
                        ),
                    )
                    .with_details(json!({
                        "timeout_ms": self.config.timeout.as_millis() as u64,
                    })))
                }
            };
            results.insert(
                task.name,
                SubCallResult::new(task.dependency, task.required, outcome),
            );
        }
        results
    }
}

struct Pending {
    name: String,
    dependency: String,
    required: bool,
    handle: JoinHandle<Result<Value, ClassifiedError>>,
}

async fn execute(pipeline: &ResiliencePipeline, call: &SubCall) -> Result<Value, ClassifiedError> {
    let invocation = call.invocation();
    match call.cache() {
        Some((key, ttl)) => {
            pipeline
                .call_cached(call.dependency(), key, *ttl, || invocation())
                .await
        }
        None => pipeline.call(call.dependency(), || invocation()).await,
    }
}

fn depth_exceeded(
    subcalls: BTreeMap<String, SubCall>,
    depth: usize,
    max_depth: usize,
) -> BTreeMap<String, SubCallResult> {
    subcalls
        .into_iter()
        .map(|(name, call)| {
            let error = ClassifiedError::new(
                ErrorCode::InternalError,
                "orchestration depth limit exceeded",
            )
            .with_details(json!({ "depth": depth, "max_depth": max_depth }));
            let slot = SubCallResult::new(
                call.dependency().to_string(),
                call.is_required(),
                Err(error),
            );
            (name, slot)
        })
        .collect()
}

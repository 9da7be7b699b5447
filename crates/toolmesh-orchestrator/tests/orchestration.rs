//! End-to-end fan-out behavior against the public API

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use toolmesh_core::{
    CircuitBreakerConfig, CircuitState, ConfigIssue, ErrorCode, ResilienceEvent,
    ResilienceRegistry, RetryPolicy, ServiceGate, TraceContext, UpstreamError, ValidateConfig,
    SERVICE_NOT_CONFIGURED,
};
use toolmesh_orchestrator::{GatedInvoker, Invoke, Orchestrator, OrchestratorConfig, SubCall};

/// Records the trace each invocation observed
#[derive(Default)]
struct TraceRecorder {
    seen: Mutex<Vec<TraceContext>>,
}

#[async_trait]
impl Invoke for TraceRecorder {
    async fn invoke(&self, _args: Value) -> Result<Value, UpstreamError> {
        if let Some(ctx) = TraceContext::current() {
            self.seen.lock().unwrap().push(ctx);
        }
        Ok(json!({ "ok": true }))
    }
}

/// Sleeps before answering
struct Slow(Duration);

#[async_trait]
impl Invoke for Slow {
    async fn invoke(&self, _args: Value) -> Result<Value, UpstreamError> {
        tokio::time::sleep(self.0).await;
        Ok(json!({ "slept_ms": self.0.as_millis() as u64 }))
    }
}

fn slow(dependency: &str, delay: Duration) -> SubCall {
    SubCall::from_invoker(dependency, Arc::new(Slow(delay)), json!({}), true)
}

fn registry() -> Arc<ResilienceRegistry> {
    Arc::new(ResilienceRegistry::new().with_retry_policy(RetryPolicy::no_retry()))
}

fn unavailable() -> SubCall {
    SubCall::required("hospital-pricing", || async {
        Err(UpstreamError::Http {
            status: 503,
            retry_after: None,
            body: Some("maintenance".to_string()),
        })
    })
}

fn answer(dependency: &str, value: Value) -> SubCall {
    SubCall::required(dependency, move || {
        let value = value.clone();
        async move { Ok(value) }
    })
}

#[tokio::test]
async fn partial_failure_keeps_successful_slots() {
    let orch = Orchestrator::with_defaults(registry());
    let result = orch
        .run(
            [
                ("trials", answer("clinical-trials", json!({ "count": 3 }))),
                ("pricing", unavailable()),
                ("filings", answer("sec-edgar", json!({ "filings": [] }))),
            ],
            None,
        )
        .await;

    assert!(result.partial());
    assert!(!result.complete_failure());
    assert_eq!(result.get("trials").unwrap().data().unwrap()["count"], 3);

    let pricing = result.get("pricing").unwrap().error().unwrap();
    assert_eq!(pricing.code, ErrorCode::UpstreamUnavailable);
    assert!(pricing.retryable());
}

#[tokio::test]
async fn complete_failure_when_every_required_call_fails() {
    let orch = Orchestrator::with_defaults(registry());
    let result = orch
        .run([("a", unavailable()), ("b", unavailable())], None)
        .await;

    assert!(result.complete_failure());
    assert_eq!(result.failed().count(), 2);
}

#[tokio::test(start_paused = true)]
async fn subcalls_run_concurrently() {
    let orch = Orchestrator::with_defaults(registry());
    let started = Instant::now();

    let result = orch
        .run(
            [
                ("a", slow("a", Duration::from_millis(300))),
                ("b", slow("b", Duration::from_millis(500))),
                ("c", slow("c", Duration::from_millis(400))),
            ],
            None,
        )
        .await;

    let elapsed = started.elapsed();
    assert!(result.succeeded().count() == 3);
    assert!(elapsed >= Duration::from_millis(500));
    assert!(elapsed < Duration::from_millis(1200), "ran sequentially: {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn deadline_fills_pending_slots_with_timeout_errors() {
    let config = OrchestratorConfig::new().with_timeout(Duration::from_secs(1));
    let orch = Orchestrator::new(registry(), config);

    let result = orch
        .run(
            [
                ("fast", slow("fast", Duration::from_millis(100))),
                ("stuck", slow("stuck", Duration::from_secs(60))),
            ],
            None,
        )
        .await;

    assert!(result.get("fast").unwrap().is_success());
    let stuck = result.get("stuck").unwrap().error().unwrap();
    assert_eq!(stuck.code, ErrorCode::UpstreamUnavailable);
    assert_eq!(stuck.details.as_ref().unwrap()["timeout_ms"], 1000);
    assert!(result.partial());
    assert!(result.elapsed_ms() < 2000);
}

#[tokio::test]
async fn every_subcall_shares_the_trace() {
    let recorder = Arc::new(TraceRecorder::default());
    let orch = Orchestrator::with_defaults(registry());
    let invoker: Arc<dyn Invoke> = recorder.clone();

    let result = orch
        .run(
            (0..4).map(|i| {
                (
                    format!("slot-{i}"),
                    SubCall::from_invoker(
                        format!("dep-{i}"),
                        Arc::clone(&invoker),
                        json!({}),
                        true,
                    ),
                )
            }),
            None,
        )
        .await;

    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen.len(), 4);
    assert!(seen.iter().all(|ctx| *ctx == result.trace()));
}

#[tokio::test]
async fn top_level_runs_get_distinct_correlation_ids() {
    let orch = Orchestrator::with_defaults(registry());
    let first = orch.run([("a", answer("a", json!(1)))], None).await;
    let second = orch.run([("a", answer("a", json!(1)))], None).await;
    assert_ne!(first.correlation_id(), second.correlation_id());
    assert_ne!(first.trace_id(), second.trace_id());
}

#[tokio::test]
async fn nested_orchestrations_stop_at_max_depth() {
    let orch = Orchestrator::new(registry(), OrchestratorConfig::new().with_max_depth(2));
    let invocations = Arc::new(AtomicU32::new(0));

    fn recurse(orch: Orchestrator, invocations: Arc<AtomicU32>) -> SubCall {
        SubCall::required("recursive", move || {
            let orch = orch.clone();
            let invocations = Arc::clone(&invocations);
            async move {
                invocations.fetch_add(1, Ordering::SeqCst);
                let inner = orch
                    .run([("child", recurse(orch.clone(), Arc::clone(&invocations)))], None)
                    .await;
                Ok(serde_json::to_value(&inner).unwrap_or(Value::Null))
            }
        })
    }

    let outer = orch
        .run([("root", recurse(orch.clone(), Arc::clone(&invocations)))], None)
        .await;

    // depth 0 and depth 1 dispatch; depth 2 refuses
    assert_eq!(invocations.load(Ordering::SeqCst), 2);

    let level1 = outer.get("root").unwrap().data().unwrap();
    let level2 = &level1["results"]["child"]["data"];
    assert_eq!(level2["results"]["child"]["status"], "failure");
    assert_eq!(level2["results"]["child"]["error"]["code"], "INTERNAL_ERROR");
    assert_eq!(level2["complete_failure"], true);
    assert_eq!(level2["trace_id"], outer.trace_id());
}

struct MissingKey;

impl ValidateConfig for MissingKey {
    fn validate(&self) -> Vec<ConfigIssue> {
        vec![ConfigIssue::new("api_key", "Required field 'api_key' is missing")]
    }
}

#[tokio::test]
async fn unconfigured_service_degrades_its_own_slot() {
    let gate = ServiceGate::new("pricing", &MissingKey, false).unwrap();
    let never_called: Arc<dyn Invoke> = Arc::new(Slow(Duration::ZERO));
    let invoker: Arc<dyn Invoke> = Arc::new(GatedInvoker::new(gate, never_called));

    let result = Orchestrator::with_defaults(registry())
        .run(
            [
                ("pricing", SubCall::from_invoker("pricing", invoker, json!({}), false)),
                ("trials", answer("trials", json!({ "count": 1 }))),
            ],
            None,
        )
        .await;

    let error = result.get("pricing").unwrap().error().unwrap();
    assert_eq!(error.code, ErrorCode::ServiceNotConfigured);
    let details = error.details.as_ref().unwrap();
    assert_eq!(details["error_code"], SERVICE_NOT_CONFIGURED);
    assert_eq!(details["issues"][0]["field"], "api_key");
    assert!(!result.partial());
    assert!(!result.complete_failure());
}

#[tokio::test]
async fn breaker_opens_across_runs_and_rejects_without_invoking() {
    let registry = Arc::new(
        ResilienceRegistry::new()
            .with_retry_policy(RetryPolicy::no_retry())
            .with_breaker_config(CircuitBreakerConfig {
                failure_threshold: 2,
                ..CircuitBreakerConfig::default()
            }),
    );
    let orch = Orchestrator::with_defaults(Arc::clone(&registry));
    let calls = Arc::new(AtomicU32::new(0));

    let flaky = {
        let calls = Arc::clone(&calls);
        move || {
            let calls = Arc::clone(&calls);
            SubCall::required("flaky", move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(UpstreamError::Http {
                        status: 502,
                        retry_after: None,
                        body: None,
                    })
                }
            })
        }
    };

    for _ in 0..2 {
        orch.run([("x", flaky())], None).await;
    }
    assert_eq!(registry.breakers().get("flaky").state(), CircuitState::Open);

    let result = orch.run([("x", flaky())], None).await;
    let error = result.get("x").unwrap().error().unwrap();
    assert_eq!(error.code, ErrorCode::CircuitBreakerOpen);
    assert!(error.retry_after.is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cached_subcall_invokes_once() {
    let orch = Orchestrator::with_defaults(registry());
    let calls = Arc::new(AtomicU32::new(0));

    let lookup = || {
        let calls = Arc::clone(&calls);
        SubCall::required("npi", move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(json!({ "npi": "1234567890" })) }
        })
        .cached("npi:1234567890", Duration::from_secs(60))
    };

    let first = orch.run([("provider", lookup())], None).await;
    let second = orch.run([("provider", lookup())], None).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.get("provider"), second.get("provider"));
}

#[tokio::test]
async fn completion_event_is_published() {
    let registry = registry();
    let mut events = registry.telemetry().subscribe();
    let orch = Orchestrator::with_defaults(Arc::clone(&registry));

    let result = orch
        .run([("ok", answer("a", json!(1))), ("bad", unavailable())], None)
        .await;

    let mut completed = None;
    while let Ok(event) = events.try_recv() {
        if let ResilienceEvent::OrchestrationCompleted { .. } = event {
            completed = Some(event);
        }
    }

    match completed {
        Some(ResilienceEvent::OrchestrationCompleted {
            trace_id,
            total,
            failed,
            partial,
            ..
        }) => {
            assert_eq!(trace_id, result.trace_id());
            assert_eq!(total, 2);
            assert_eq!(failed, 1);
            assert!(partial);
        }
        other => panic!("no completion event: {other:?}"),
    }
}

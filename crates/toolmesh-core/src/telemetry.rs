//! Telemetry - best-effort resilience event broadcast
//!
//! The bus is a fully isolated outbound channel. Publishing never blocks,
//! never fails the caller, and drops events when nobody is listening.

use crate::error::ErrorCode;
use crate::utils::CircuitState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Events emitted by the resilience layer.
///
/// Events carry identifiers and outcomes only, never upstream payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResilienceEvent {
    /// A circuit breaker changed state
    BreakerTransition {
        /// Dependency name
        dependency: String,
        /// Previous state
        from: CircuitState,
        /// New state
        to: CircuitState,
        /// Wall-clock time of the transition
        at: DateTime<Utc>,
    },
    /// A call was rejected by the rate limiter
    RateLimited {
        /// Resource name
        resource: String,
        /// Time until the window frees a slot
        retry_after_ms: u64,
        /// Wall-clock time of the rejection
        at: DateTime<Utc>,
    },
    /// A pipeline call settled
    CallCompleted {
        /// Dependency name
        dependency: String,
        /// `None` on success, otherwise the classified code
        outcome: Option<ErrorCode>,
        /// Attempts made (0 when rejected before invoking)
        attempts: u32,
        /// Total time including backoff
        duration_ms: u64,
        /// Trace of the request on whose behalf the call ran
        trace_id: Option<String>,
    },
    /// An orchestration finished
    OrchestrationCompleted {
        /// Trace identifier
        trace_id: String,
        /// Correlation identifier
        correlation_id: String,
        /// Number of sub-calls
        total: usize,
        /// Number of failed sub-calls
        failed: usize,
        /// Partial flag of the result
        partial: bool,
        /// Complete-failure flag of the result
        complete_failure: bool,
        /// Wall time of the fan-out
        duration_ms: u64,
    },
}

impl ResilienceEvent {
    /// Build a breaker transition event stamped with the current time
    #[must_use]
    pub fn breaker_transition(dependency: &str, from: CircuitState, to: CircuitState) -> Self {
        Self::BreakerTransition {
            dependency: dependency.to_string(),
            from,
            to,
            at: Utc::now(),
        }
    }

    /// Build a rate-limit rejection event stamped with the current time
    #[must_use]
    pub fn rate_limited(resource: &str, retry_after_ms: u64) -> Self {
        Self::RateLimited {
            resource: resource.to_string(),
            retry_after_ms,
            at: Utc::now(),
        }
    }

    /// Short event name, matching the serialized `type` tag
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BreakerTransition { .. } => "breaker_transition",
            Self::RateLimited { .. } => "rate_limited",
            Self::CallCompleted { .. } => "call_completed",
            Self::OrchestrationCompleted { .. } => "orchestration_completed",
        }
    }
}

/// Broadcast-based bus for resilience events.
///
/// Slow subscribers miss events (lagged) rather than blocking the publisher.
#[derive(Debug, Clone)]
pub struct TelemetryBus {
    sender: broadcast::Sender<ResilienceEvent>,
}

impl TelemetryBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to all future events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ResilienceEvent> {
        self.sender.subscribe()
    }

    /// Publish an event, returning how many subscribers received it.
    ///
    /// With no subscribers the event is silently dropped.
    pub fn publish(&self, event: ResilienceEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Current number of subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Forward every event to the `tracing` log until the bus is dropped
    pub fn spawn_log_forwarder(&self) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) => info!(
                            target: "toolmesh::telemetry",
                            kind = event.kind(),
                            event = %json
                        ),
                        Err(e) => debug!(error = %e, "Failed to serialize telemetry event"),
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Telemetry forwarder lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for TelemetryBus {
    fn default() -> Self {
        Self::new(256)
    }
}

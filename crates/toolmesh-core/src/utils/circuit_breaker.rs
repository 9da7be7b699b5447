//! Circuit Breaker pattern implementation
//!
//! Provides fault tolerance by preventing cascading failures.
//! The circuit breaker has three states:
//! - Closed: Normal operation, requests pass through
//! - Open: Failures reached threshold, requests are rejected
//! - HalfOpen: Testing if the dependency has recovered, one probe at a time
//!
//! All counters and the state live behind a single mutex per breaker so a
//! transition is atomic with respect to concurrent callers of that breaker.
//! [`BreakerRegistry`] keeps one breaker per dependency name, so contention
//! on one dependency never blocks another.

use crate::telemetry::{ResilienceEvent, TelemetryBus};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Failures reached threshold - requests are rejected
    Open,
    /// Testing recovery - a single probe passes through
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Configuration for circuit breaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Number of successes in half-open state to close the circuit
    pub success_threshold: u32,
    /// Duration to wait before transitioning from open to half-open
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set failure threshold
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Set success threshold for half-open state
    #[must_use]
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }

    /// Set open-state timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Error returned by [`CircuitBreaker::call`]
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker rejected the call without invoking it
    #[error("circuit breaker '{name}' is open")]
    Open {
        /// Breaker name
        name: String,
        /// Time left before a probe is allowed
        remaining: Duration,
    },
    /// The wrapped operation failed
    #[error("{0}")]
    Inner(E),
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl Default for BreakerState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
            probe_in_flight: false,
        }
    }
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    /// Dependency name
    pub name: String,
    /// Current state
    pub state: CircuitState,
    /// Consecutive failures while closed
    pub failure_count: u32,
    /// Successes while half-open
    pub success_count: u32,
    /// Milliseconds until a probe is allowed (open state only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in_ms: Option<u64>,
}

/// Circuit breaker for fault tolerance
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    telemetry: Option<TelemetryBus>,
}

/// Outstanding permission to run one call
///
/// Dropping an unsettled probe frees the half-open slot so a cancelled
/// probe cannot wedge the breaker.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl Admission<'_> {
    fn success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.probe);
    }

    fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.probe);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            let mut inner = self.breaker.lock();
            if inner.state == CircuitState::HalfOpen {
                inner.probe_in_flight = false;
            }
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState::default()),
            telemetry: None,
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Publish state transitions on a telemetry bus
    #[must_use]
    pub fn with_telemetry(mut self, bus: TelemetryBus) -> Self {
        self.telemetry = Some(bus);
        self
    }

    /// Get the circuit breaker name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current state
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Get current failure count
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Get current half-open success count
    #[must_use]
    pub fn success_count(&self) -> u32 {
        self.lock().success_count
    }

    /// Snapshot the breaker
    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        let retry_in_ms = match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at)) => Some(
                self.config
                    .timeout
                    .saturating_sub(opened_at.elapsed())
                    .as_millis() as u64,
            ),
            _ => None,
        };
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            retry_in_ms,
        }
    }

    /// Run an operation through the breaker, counting every error as a failure
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::Open`] without calling `operation` while open,
    /// or [`BreakerError::Inner`] with the operation's own error.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_with(operation, |_| true).await
    }

    /// Run an operation through the breaker with a custom failure predicate
    ///
    /// Errors for which `is_failure` returns false count as successes for
    /// breaker health (the dependency answered).
    ///
    /// # Errors
    ///
    /// Same as [`CircuitBreaker::call`].
    pub async fn call_with<T, E, F, Fut, P>(
        &self,
        operation: F,
        is_failure: P,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let admission = self.admit().map_err(|remaining| BreakerError::Open {
            name: self.name.clone(),
            remaining,
        })?;

        match operation().await {
            Ok(value) => {
                admission.success();
                Ok(value)
            }
            Err(e) => {
                if is_failure(&e) {
                    admission.failure();
                } else {
                    admission.success();
                }
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Check if the circuit allows a request right now
    #[must_use]
    pub fn can_execute(&self) -> bool {
        let inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => !inner.probe_in_flight,
            CircuitState::Open => inner
                .opened_at
                .map_or(true, |at| at.elapsed() >= self.config.timeout),
        }
    }

    /// Record a successful operation
    pub fn record_success(&self) {
        self.on_success(true);
    }

    /// Record a failed operation
    pub fn record_failure(&self) {
        self.on_failure(true);
    }

    /// Settle a success; in half-open only the probe counts
    fn on_success(&self, probe: bool) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen if !probe => {}
            CircuitState::HalfOpen => {
                inner.probe_in_flight = false;
                inner.success_count += 1;
                debug!(
                    name = %self.name,
                    successes = inner.success_count,
                    threshold = self.config.success_threshold,
                    "Circuit breaker success in half-open state"
                );

                if inner.success_count >= self.config.success_threshold {
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            CircuitState::Open => {
                // Late completion of a call admitted before the trip
            }
        }
    }

    /// Settle a failure; in half-open only the probe counts
    fn on_failure(&self, probe: bool) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                debug!(
                    name = %self.name,
                    failures = inner.failure_count,
                    threshold = self.config.failure_threshold,
                    "Circuit breaker failure recorded"
                );

                if inner.failure_count >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen if !probe => {}
            CircuitState::HalfOpen => {
                warn!(
                    name = %self.name,
                    "Circuit breaker failure in half-open state, reopening"
                );
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            self.transition(&mut inner, CircuitState::Closed);
        }
        inner.failure_count = 0;
    }

    /// Decide whether one call may proceed, performing open → half-open
    fn admit(&self) -> Result<Admission<'_>, Duration> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(Admission {
                breaker: self,
                probe: false,
                settled: false,
            }),
            CircuitState::Open => {
                let elapsed = inner.opened_at.map_or(self.config.timeout, |at| at.elapsed());
                if elapsed < self.config.timeout {
                    return Err(self.config.timeout - elapsed);
                }
                self.transition(&mut inner, CircuitState::HalfOpen);
                inner.probe_in_flight = true;
                Ok(Admission {
                    breaker: self,
                    probe: true,
                    settled: false,
                })
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    return Err(Duration::ZERO);
                }
                inner.probe_in_flight = true;
                Ok(Admission {
                    breaker: self,
                    probe: true,
                    settled: false,
                })
            }
        }
    }

    /// Apply a state change; caller holds the lock
    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        match to {
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
                inner.success_count = 0;
                inner.probe_in_flight = false;
                info!(
                    name = %self.name,
                    failures = inner.failure_count,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                inner.success_count = 0;
                info!(name = %self.name, "Circuit breaker entering half-open state");
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
                inner.success_count = 0;
                inner.opened_at = None;
                inner.probe_in_flight = false;
                info!(name = %self.name, "Circuit breaker closed");
            }
        }

        if let Some(bus) = &self.telemetry {
            bus.publish(ResilienceEvent::breaker_transition(&self.name, from, to));
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One breaker per dependency name, created lazily
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    default_config: CircuitBreakerConfig,
    overrides: HashMap<String, CircuitBreakerConfig>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    telemetry: Option<TelemetryBus>,
}

impl BreakerRegistry {
    /// Create a registry using `default_config` for every dependency
    #[must_use]
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            ..Self::default()
        }
    }

    /// Use a specific configuration for one dependency
    #[must_use]
    pub fn with_override(mut self, name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        self.overrides.insert(name.into(), config);
        self
    }

    /// Publish transitions of every breaker on a telemetry bus
    #[must_use]
    pub fn with_telemetry(mut self, bus: TelemetryBus) -> Self {
        self.telemetry = Some(bus);
        self
    }

    /// Get or create the breaker for a dependency
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(name) {
            return Arc::clone(&breaker);
        }

        let breaker = self
            .breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                let config = self
                    .overrides
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| self.default_config.clone());
                let breaker = CircuitBreaker::new(name, config);
                Arc::new(match &self.telemetry {
                    Some(bus) => breaker.with_telemetry(bus.clone()),
                    None => breaker,
                })
            });
        Arc::clone(&breaker)
    }

    /// Reset one breaker to closed, returning whether it existed
    pub fn reset(&self, name: &str) -> bool {
        match self.breakers.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Snapshot every breaker, sorted by name
    #[must_use]
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|b| Arc::clone(b.value())).collect();
        let mut snapshots: Vec<BreakerSnapshot> = breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Number of breakers created so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// Whether no breaker has been created yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

//! Metrics collection for observability
//!
//! Lightweight in-process counters. A [`ResilienceMetrics`] instance is
//! owned by the registry and injected where needed; there is no global.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// A thread-safe counter metric
#[derive(Debug, Default, Clone)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    /// Create a new counter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the counter by a specific amount
    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Get the current value
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Label set as (key, value) pairs in declaration order
pub type LabelKey = Vec<(String, String)>;

/// Counter family keyed by label set
#[derive(Debug, Default, Clone)]
pub struct LabeledCounter {
    entries: Arc<RwLock<HashMap<LabelKey, Counter>>>,
}

impl LabeledCounter {
    /// Create a new labeled counter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by 1 for the given label set
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.inc_by(labels, 1);
    }

    /// Increment by `n` for the given label set
    pub fn inc_by(&self, labels: &[(&str, &str)], n: u64) {
        let key: LabelKey = labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();

        let counters = self.entries.read().unwrap_or_else(|e| e.into_inner());
        if let Some(c) = counters.get(&key) {
            c.inc_by(n);
            return;
        }
        drop(counters);

        let mut counters = self.entries.write().unwrap_or_else(|e| e.into_inner());
        counters.entry(key).or_default().inc_by(n);
    }

    /// Value for one label set (0 if never incremented)
    #[must_use]
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        let counters = self.entries.read().unwrap_or_else(|e| e.into_inner());
        counters
            .iter()
            .find(|(key, _)| {
                key.len() == labels.len()
                    && key
                        .iter()
                        .zip(labels)
                        .all(|((k, v), (lk, lv))| k == lk && v == lv)
            })
            .map_or(0, |(_, c)| c.get())
    }

    /// Get all entries (label set → value)
    #[must_use]
    pub fn entries(&self) -> Vec<(LabelKey, u64)> {
        let counters = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<(LabelKey, u64)> = counters
            .iter()
            .map(|(labels, c)| (labels.clone(), c.get()))
            .collect();
        entries.sort();
        entries
    }
}

/// Counters maintained by the resilience pipeline
#[derive(Debug, Default, Clone)]
pub struct ResilienceMetrics {
    /// Settled calls by `dependency` and `outcome` (`ok` or an error code)
    pub calls: LabeledCounter,
    /// Retries (attempts beyond the first) by `dependency`
    pub retries: LabeledCounter,
    /// Calls rejected by an open breaker, by `dependency`
    pub breaker_rejections: LabeledCounter,
    /// Calls rejected by the rate limiter, by `dependency`
    pub rate_limit_rejections: LabeledCounter,
}

/// Serializable view of [`ResilienceMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// dependency → outcome → count
    pub calls: BTreeMap<String, BTreeMap<String, u64>>,
    /// dependency → retries
    pub retries: BTreeMap<String, u64>,
    /// dependency → breaker rejections
    pub breaker_rejections: BTreeMap<String, u64>,
    /// dependency → rate-limit rejections
    pub rate_limit_rejections: BTreeMap<String, u64>,
}

impl ResilienceMetrics {
    /// Create empty metrics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one settled call
    pub fn record_call(&self, dependency: &str, outcome: &str) {
        self.calls
            .inc(&[("dependency", dependency), ("outcome", outcome)]);
    }

    /// Take a snapshot of every counter
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut calls: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
        for (labels, value) in self.calls.entries() {
            let dep = label(&labels, "dependency");
            if let (Some(dep), Some(outcome)) = (dep, label(&labels, "outcome")) {
                calls
                    .entry(dep.to_string())
                    .or_default()
                    .insert(outcome.to_string(), value);
            }
        }

        MetricsSnapshot {
            calls,
            retries: by_dependency(&self.retries),
            breaker_rejections: by_dependency(&self.breaker_rejections),
            rate_limit_rejections: by_dependency(&self.rate_limit_rejections),
        }
    }

    /// Export all counters in Prometheus text format
    #[must_use]
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();
        for (name, counter) in [
            ("toolmesh_calls_total", &self.calls),
            ("toolmesh_retries_total", &self.retries),
            ("toolmesh_breaker_rejections_total", &self.breaker_rejections),
            ("toolmesh_rate_limit_rejections_total", &self.rate_limit_rejections),
        ] {
            output.push_str(&format!("# TYPE {} counter\n", name));
            for (labels, value) in counter.entries() {
                let rendered: Vec<String> = labels
                    .iter()
                    .map(|(k, v)| format!("{}=\"{}\"", k, v))
                    .collect();
                output.push_str(&format!("{}{{{}}} {}\n", name, rendered.join(","), value));
            }
        }
        output
    }
}

fn label<'a>(labels: &'a LabelKey, key: &str) -> Option<&'a str> {
    labels
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn by_dependency(counter: &LabeledCounter) -> BTreeMap<String, u64> {
    counter
        .entries()
        .into_iter()
        .filter_map(|(labels, value)| label(&labels, "dependency").map(|d| (d.to_string(), value)))
        .collect()
}

//! Result aggregation
//!
//! Turns settled slots into an [`OrchestrationResult`] and derives the
//! `partial` / `complete_failure` flags.

use super::types::{OrchestrationResult, SubCallResult};
use std::collections::BTreeMap;
use toolmesh_core::TraceContext;

/// Build the immutable result for one fan-out
pub(super) fn build_result(
    trace: &TraceContext,
    results: BTreeMap<String, SubCallResult>,
    elapsed_ms: u64,
) -> OrchestrationResult {
    let (partial, complete_failure) = failure_flags(&results);
    OrchestrationResult {
        trace_id: trace.trace_id().to_string(),
        correlation_id: trace.correlation_id().to_string(),
        results,
        partial,
        complete_failure,
        elapsed_ms,
    }
}

/// `(partial, complete_failure)` for a set of settled slots.
///
/// Optional failures never flip either flag. With no required slots,
/// complete failure means every slot failed.
fn failure_flags(results: &BTreeMap<String, SubCallResult>) -> (bool, bool) {
    let any_success = results.values().any(SubCallResult::is_success);
    let mut required = results.values().filter(|r| r.required).peekable();

    if required.peek().is_none() {
        let all_failed = !results.is_empty() && !any_success;
        return (false, all_failed);
    }

    let (mut required_failed, mut required_total) = (0usize, 0usize);
    for slot in required {
        required_total += 1;
        if !slot.is_success() {
            required_failed += 1;
        }
    }

    let complete_failure = required_failed == required_total;
    let partial = required_failed > 0 && any_success;
    (partial, complete_failure)
}

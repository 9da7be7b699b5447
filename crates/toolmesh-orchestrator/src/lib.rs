//! Toolmesh Orchestrator - Fan-out over resilient upstream calls
//!
//! This crate composes independent calls to upstream services into one
//! aggregated result that tolerates partial failure:
//! - `Orchestrator`: concurrent dispatch, global deadline, result aggregation
//! - `SubCall`: one named call, required or optional
//! - `Invoke`: the collaborator contract (`invoke(args) -> result`)
//! - `HttpInvoker`: JSON-over-HTTP collaborator with trace header injection

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod http;
pub mod invoker;
pub mod orchestrator;

pub use http::HttpInvoker;
pub use invoker::{GatedInvoker, Invoke};
pub use orchestrator::{
    OrchestrationResult, Orchestrator, OrchestratorConfig, SubCall, SubCallOutcome, SubCallResult,
};

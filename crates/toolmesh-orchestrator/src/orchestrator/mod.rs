//! Orchestrator - Concurrent fan-out with partial-failure aggregation
//!
//! # Module Structure
//!
//! - `types`: SubCall, SubCallOutcome, SubCallResult, OrchestrationResult
//! - `config`: OrchestratorConfig (deadline, nesting depth)
//! - `core`: Orchestrator struct and the dispatch loop
//! - `result_builder`: aggregation into OrchestrationResult

mod config;
mod core;
mod result_builder;
mod types;


pub use config::OrchestratorConfig;
pub use core::Orchestrator;
pub use types::{Invocation, OrchestrationResult, SubCall, SubCallOutcome, SubCallResult};

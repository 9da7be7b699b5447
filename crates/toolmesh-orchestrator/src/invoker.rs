//! Collaborator contract
//!
//! Every domain client wrapped by the orchestrator exposes one awaitable
//! `invoke(args) -> result`. The orchestrator never inspects `result`.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use toolmesh_core::{ServiceGate, UpstreamError};
use tracing::debug;

/// An upstream operation that can be invoked with JSON arguments
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Invoke: Send + Sync {
    /// Invoke the operation, returning a raw error on failure
    async fn invoke(&self, args: Value) -> Result<Value, UpstreamError>;
}

/// Short-circuits an invoker whose service is not configured
///
/// While the gate is closed every call returns the exact
/// `SERVICE_NOT_CONFIGURED` payload without touching the inner invoker.
pub struct GatedInvoker {
    gate: ServiceGate,
    inner: Arc<dyn Invoke>,
}

impl GatedInvoker {
    /// Wrap `inner` behind `gate`
    #[must_use]
    pub fn new(gate: ServiceGate, inner: Arc<dyn Invoke>) -> Self {
        Self { gate, inner }
    }

    /// The service gate
    #[must_use]
    pub fn gate(&self) -> &ServiceGate {
        &self.gate
    }
}

impl std::fmt::Debug for GatedInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatedInvoker")
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Invoke for GatedInvoker {
    async fn invoke(&self, args: Value) -> Result<Value, UpstreamError> {
        if let Err(payload) = self.gate.check() {
            debug!(service = %self.gate.service(), "Service not configured, short-circuiting");
            return Err(UpstreamError::NotConfigured(payload));
        }
        self.inner.invoke(args).await
    }
}

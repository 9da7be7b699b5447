//! Application wiring
//!
//! Turns an [`AppConfig`] into a shared resilience registry, an
//! orchestrator, and one gated HTTP invoker per configured service.

pub mod config;
pub mod loader;

pub use config::AppConfig;
pub use loader::load_config;

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use toolmesh_core::{ResilienceRegistry, ServiceGate};
use toolmesh_orchestrator::{GatedInvoker, HttpInvoker, Invoke, Orchestrator, SubCall};
use tracing::info;

/// A configured upstream ready to be fanned out to
pub struct Service {
    pub name: String,
    pub required: bool,
    pub ready: bool,
    invoker: Arc<dyn Invoke>,
}

impl Service {
    pub fn subcall(&self, args: Value) -> SubCall {
        SubCall::from_invoker(self.name.clone(), Arc::clone(&self.invoker), args, self.required)
    }
}

/// Everything a command needs to run fan-outs
pub struct Runtime {
    pub registry: Arc<ResilienceRegistry>,
    pub orchestrator: Orchestrator,
    pub services: Vec<Service>,
}

impl Runtime {
    /// Build the runtime.
    ///
    /// Resilience and orchestrator settings are always validated fail-fast;
    /// services follow `fail_fast`.
    pub fn build(config: &AppConfig, fail_fast: bool) -> Result<Self> {
        toolmesh_core::resolve("orchestrator", &config.orchestrator, true)
            .context("Invalid orchestrator settings")?;

        let mut registry = ResilienceRegistry::from_settings(&config.resilience)
            .context("Invalid resilience settings")?;

        let mut services = Vec::with_capacity(config.services.len());
        for (name, settings) in &config.services {
            let gate = ServiceGate::new(name.as_str(), settings, fail_fast)
                .with_context(|| format!("Service '{}' is misconfigured", name))?;

            if let Some(limit) = &settings.rate_limit {
                registry = registry.with_rate_limit_override(name, limit.into());
            }

            let mut http = HttpInvoker::new(settings.url.clone().unwrap_or_default())
                .with_timeout(settings.timeout());
            if let Some(key) = &settings.api_key {
                http = http.with_api_key(key.clone());
            }

            services.push(Service {
                name: name.clone(),
                required: settings.required,
                ready: gate.is_ready(),
                invoker: Arc::new(GatedInvoker::new(gate, Arc::new(http))),
            });
        }

        let registry = Arc::new(registry);
        let orchestrator = Orchestrator::new(Arc::clone(&registry), (&config.orchestrator).into());

        info!(
            services = services.len(),
            ready = services.iter().filter(|s| s.ready).count(),
            "Runtime initialized"
        );

        Ok(Self {
            registry,
            orchestrator,
            services,
        })
    }

    /// One sub-call per configured service, all with the same arguments
    pub fn subcalls(&self, args: &Value) -> Vec<(String, SubCall)> {
        self.services
            .iter()
            .map(|service| (service.name.clone(), service.subcall(args.clone())))
            .collect()
    }
}

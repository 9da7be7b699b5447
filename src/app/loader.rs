//! Layered configuration loading

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
///
/// `extra` is applied after `config/local` and before the environment.
pub fn load_config(extra: Option<&Path>) -> Result<AppConfig> {
    let mut builder = Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            File::with_name(&format!(
                "config/{}",
                std::env::var("TOOLMESH_ENV").unwrap_or_else(|_| "development".to_string())
            ))
            .required(false),
        )
        .add_source(File::with_name("config/local").required(false));

    if let Some(path) = extra {
        builder = builder.add_source(File::from(path).required(true));
    }

    // TOOLMESH_SERVICES__PRICING__URL, not TOOLMESH__SERVICES__...
    let config = builder
        .add_source(
            Environment::with_prefix("TOOLMESH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Parse a standalone TOML document on top of the embedded defaults
#[cfg(test)]
fn load_from_str(toml: &str) -> Result<AppConfig> {
    Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_parse() {
        let config = load_from_str("").unwrap();
        assert_eq!(config.orchestrator.timeout_ms, 10_000);
        assert_eq!(config.orchestrator.max_depth, 4);
        assert_eq!(config.resilience.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.resilience.retry.max_attempts, 3);
        assert!(config.services.is_empty());
    }

    #[test]
    fn test_services_and_overrides() {
        let config = load_from_str(
            r#"
            [resilience.overrides.pricing.circuit_breaker]
            failure_threshold = 2

            [services.pricing]
            url = "https://pricing.example.com/quote"
            required = false
            timeout_ms = 1500

            [services.pricing.rate_limit]
            max_requests = 5
            window_secs = 1

            [services.trials]
            url = "https://trials.example.com/search"
            "#,
        )
        .unwrap();

        let pricing = &config.services["pricing"];
        assert!(!pricing.required);
        assert_eq!(pricing.timeout_ms, 1500);
        assert_eq!(pricing.rate_limit.as_ref().unwrap().max_requests, 5);
        assert!(config.services["trials"].required);
        let breaker = config.resilience.overrides["pricing"]
            .circuit_breaker
            .as_ref()
            .unwrap();
        assert_eq!(breaker.failure_threshold, 2);
        assert_eq!(breaker.timeout_secs, 30);
    }
}

//! `toolmesh fanout`

use crate::app::{AppConfig, Runtime};
use clap::Args;
use serde_json::{json, Map, Value};
use toolmesh_core::TraceContext;
use tracing::info;

#[derive(Args, Debug)]
pub struct FanoutArgs {
    /// Argument passed to every service, as key=value (repeatable)
    #[arg(long = "arg", value_name = "KEY=VALUE", value_parser = parse_arg)]
    pub args: Vec<(String, Value)>,

    /// Override the orchestration deadline
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Repeat the fan-out against the same breakers and limiters
    #[arg(long, default_value_t = 1)]
    pub rounds: u32,

    /// Print breaker states and call counters after the last round
    #[arg(long)]
    pub show_breakers: bool,
}

/// `key=value`; the value is read as JSON when it parses, else as a string
fn parse_arg(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub async fn run(config: &AppConfig, args: FanoutArgs) -> anyhow::Result<()> {
    let mut config = config.clone();
    if let Some(timeout_ms) = args.timeout_ms {
        config.orchestrator.timeout_ms = timeout_ms;
    }

    let runtime = Runtime::build(&config, false)?;
    if runtime.services.is_empty() {
        anyhow::bail!("No services configured; add [services.<name>] to config/local.toml");
    }
    let _forwarder = runtime.registry.telemetry().spawn_log_forwarder();

    let call_args = Value::Object(args.args.into_iter().collect::<Map<_, _>>());
    let mut last_complete_failure = false;

    for round in 1..=args.rounds.max(1) {
        let trace = TraceContext::new();
        info!(round = round, trace_id = %trace.trace_id(), "Starting fan-out");

        let result = runtime
            .orchestrator
            .run(runtime.subcalls(&call_args), Some(trace))
            .await;
        println!("{}", serde_json::to_string_pretty(&result)?);
        last_complete_failure = result.complete_failure();
    }

    if args.show_breakers {
        let report = json!({
            "breakers": runtime.registry.breakers().snapshot(),
            "metrics": runtime.registry.metrics().snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if last_complete_failure {
        anyhow::bail!("Every required service failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arg_values() {
        assert_eq!(parse_arg("limit=5").unwrap(), ("limit".to_string(), json!(5)));
        assert_eq!(
            parse_arg("condition=asthma").unwrap(),
            ("condition".to_string(), json!("asthma"))
        );
        assert_eq!(
            parse_arg("filter={\"phase\":3}").unwrap().1,
            json!({ "phase": 3 })
        );
        assert_eq!(parse_arg("q=a=b").unwrap().1, json!("a=b"));
    }

    #[test]
    fn test_parse_arg_rejects_malformed() {
        assert!(parse_arg("novalue").is_err());
        assert!(parse_arg("=5").is_err());
    }
}

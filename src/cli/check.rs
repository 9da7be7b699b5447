//! `toolmesh check`

use crate::app::AppConfig;
use clap::Args;
use toolmesh_core::{resolve, ConfigIssue, Resolution};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Report unconfigured services instead of failing
    #[arg(long)]
    pub fail_soft: bool,
}

pub fn run(config: &AppConfig, args: CheckArgs) -> anyhow::Result<()> {
    println!("🔎 Toolmesh configuration check\n");

    let mut failures = 0usize;
    failures += report("resilience", &config.resilience, true);
    failures += report("orchestrator", &config.orchestrator, true);

    if config.services.is_empty() {
        println!("⚠️  No services configured");
    }
    for (name, service) in &config.services {
        failures += report(name, service, !args.fail_soft);
    }

    println!();
    if failures == 0 {
        println!("✅ Configuration is usable");
        Ok(())
    } else {
        anyhow::bail!("{} section(s) failed validation", failures)
    }
}

/// Print one section; returns 1 if it blocks startup
fn report<C: toolmesh_core::ValidateConfig>(name: &str, section: &C, fail_fast: bool) -> usize {
    match resolve(name, section, fail_fast) {
        Ok(Resolution::Ready) => {
            println!("✅ {}", name);
            print_warnings(&section.validate());
            0
        }
        Ok(Resolution::NotConfigured(payload)) => {
            println!("⚠️  {} (not configured, will short-circuit)", name);
            match serde_json::to_string_pretty(&payload) {
                Ok(json) => println!("{}", indent(&json)),
                Err(e) => println!("  (payload unavailable: {})", e),
            }
            0
        }
        Err(err) => {
            println!("❌ {}", name);
            for issue in &err.issues {
                print_issue(issue);
            }
            1
        }
    }
}

fn print_warnings(issues: &[ConfigIssue]) {
    for issue in issues.iter().filter(|i| !i.critical) {
        print_issue(issue);
    }
}

fn print_issue(issue: &ConfigIssue) {
    let marker = if issue.critical { "error" } else { "warning" };
    println!("  {}: {} {}", marker, issue.field, issue.message);
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

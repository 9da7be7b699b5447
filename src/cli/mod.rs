//! CLI module for Toolmesh
//!
//! Provides commands:
//! - `check`: Validate every configured service
//! - `fanout`: Call every configured service concurrently and print the result

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod check;
pub mod fanout;

/// Resilient fan-out over configured upstream services
#[derive(Parser, Debug)]
#[command(name = "toolmesh")]
#[command(about = "Resilient fan-out over upstream services")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "TOOLMESH_LOG_JSON")]
    pub log_json: bool,

    /// Extra configuration file, applied before environment variables
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and report issues per service
    Check(check::CheckArgs),
    /// Run one or more fan-outs against every configured service
    Fanout(fanout::FanoutArgs),
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = crate::app::load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Check(args)) => check::run(&config, args),
        Some(Commands::Fanout(args)) => fanout::run(&config, args).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

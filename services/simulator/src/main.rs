//! AMM scenario simulator - runs a scenario file against a fresh engine
//!
//! Usage:
//!   amm-simulator scenarios/reference.toml
//!   amm-simulator scenarios/reference.toml --config config/engine.toml --json-logs
//!   RUST_LOG=amm=debug amm-simulator scenarios/concentrated.toml

mod runner;
mod scenario;

use std::path::PathBuf;

use amm_config::{EngineConfig, LoggingConfig};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::runner::Runner;
use crate::scenario::Scenario;

#[derive(Parser, Debug)]
#[command(name = "amm-simulator")]
#[command(about = "Runs AMM engine scenarios against an in-memory ledger")]
#[command(version)]
struct Args {
    /// Scenario file (TOML)
    scenario: PathBuf,

    /// Engine configuration file; AMM__* environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level, overriding the configured one (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = EngineConfig::load(args.config.as_deref())?;
    init_logging(&args, &config.logging)?;

    let scenario = Scenario::from_file(&args.scenario)?;
    if let Some(description) = &scenario.description {
        info!(scenario = %scenario.name, "{description}");
    }

    let mut runner = Runner::new(config);
    let summary = runner.run(&scenario)?;

    for (account, token, amount) in runner.balances()? {
        info!(%account, %token, %amount, "final balance");
    }
    info!(
        succeeded = summary.succeeded,
        rejected_as_expected = summary.rejected_as_expected,
        unexpected = summary.unexpected.len(),
        "scenario finished"
    );

    if !summary.is_clean() {
        for (step, reason) in &summary.unexpected {
            error!(step, "{reason}");
        }
        bail!(
            "{} step(s) of {} did not behave as declared",
            summary.unexpected.len(),
            scenario.name
        );
    }
    Ok(())
}

fn init_logging(args: &Args, logging: &LoggingConfig) -> Result<()> {
    let level = args.log_level.as_deref().unwrap_or(&logging.level);
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level {level}"))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if args.json_logs || logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("Failed to install log subscriber: {e}"))
}

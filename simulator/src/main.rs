use anyhow::{Context, Result};
use clap::Parser;
use dynlink_simulator::{load_scenario, run_scenario};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a dynlink scenario against an in-memory host")]
struct Args {
    /// Path to the YAML scenario.
    #[arg(short, long)]
    scenario: PathBuf,

    /// Overrides the scenario's log level.
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut scenario = load_scenario(&args.scenario)?;
    if let Some(level) = args.log_level {
        scenario.config.log_level = level;
    }

    let level = scenario
        .config
        .clone()
        .validate()
        .context("invalid host configuration")?
        .log_level;
    tracing_subscriber::fmt().with_max_level(level).init();
    info!(scenario = %args.scenario.display(), "running");

    let report = run_scenario(scenario)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

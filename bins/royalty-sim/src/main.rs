//! Royalty simulator binary.
//!
//! Loads module settings and a JSON action script, replays the script against
//! an in-memory royalty module and prints a JSON report of every step plus the
//! final vault and account balances.

mod script;
mod sim;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use royalty_core::config::RoyaltySettings;

use crate::script::Script;
use crate::sim::Simulation;

/// Replay royalty grant, link, payment and claim actions.
#[derive(Parser, Debug)]
#[command(name = "royalty-sim", version, about = "Royalty share accounting simulator")]
struct Args {
    /// Settings file (TOML, JSON or YAML). `ROYALTY__*` variables override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON action script to replay
    #[arg(long)]
    script: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Stop at the first failing action
    #[arg(long)]
    strict: bool,

    /// Print the report on one line
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    let settings = RoyaltySettings::load(args.config.as_deref()).context("loading settings")?;
    let script = Script::load(&args.script)?;
    info!(
        script = %args.script.display(),
        actions = script.actions.len(),
        snapshot_interval = settings.snapshot_interval_secs,
        "replaying script"
    );

    let mut simulation = Simulation::new(settings)?;
    let report = simulation.run(&script, args.strict)?;

    let out = if args.compact {
        serde_json::to_string(&report)
    } else {
        serde_json::to_string_pretty(&report)
    }
    .context("serializing report")?;
    println!("{out}");
    Ok(())
}

/// Logs go to stderr so the report on stdout stays machine-readable.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}

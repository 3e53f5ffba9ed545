use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};
use regex::Regex;

use stratum::common::Tier;
use stratum::config::{pwd, ConfigTree, ConfigValidator, ValidateOptions};
use stratum::controller::{ProcessOrchestrator, RunOptions, StopOutcome};
use stratum::errors::Result;
use stratum::unit::{builtin, UnitLoader, UnitRegistryBuilder};
use stratum::utils::logger;

/// Tiered process orchestrator daemon.
#[derive(Debug, Parser)]
#[command(name = "stratumd", version)]
struct Args {
    /// Configuration file (JSON or YAML).
    #[arg(long)]
    config: PathBuf,

    /// Password file for encrypted config entries, one password per line.
    #[arg(long)]
    pwd_file: Option<PathBuf>,

    /// Restrict orchestration to one tier (t0, t1, t2, t3, ops).
    #[arg(long)]
    tier: Option<Tier>,

    /// Process name inclusion patterns (regex, repeatable).
    #[arg(long = "match")]
    match_: Vec<String>,

    /// Process name exclusion patterns (regex, repeatable).
    #[arg(long)]
    exclude: Vec<String>,

    /// Only run processes driven by these controller units (repeatable).
    #[arg(long)]
    controller: Vec<String>,

    /// Validate processes marked inactive as well.
    #[arg(long)]
    check_inactive: bool,

    /// Tolerate required resources missing from the tree.
    #[arg(long)]
    ignore_missing_resources: bool,

    /// Incremental verbosity (-v, -vv).
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn compile_patterns(raw: &[String]) -> Result<Vec<Regex>> {
    raw.iter()
        .map(|p| {
            Regex::new(p)
                .map_err(|e| stratum::errors::Error::config(format!("bad pattern '{p}': {e}")))
        })
        .collect()
}

async fn run(args: Args) -> Result<()> {
    let pwds = match &args.pwd_file {
        Some(path) => pwd::read_password_file(path)?,
        None => Vec::new(),
    };

    let mut registry = UnitRegistryBuilder::new();
    builtin::register_builtins(&mut registry)?;
    let registry = Arc::new(registry.build());

    let mut tree = ConfigTree::load(&args.config, &pwds, false)?;
    let validated = ConfigValidator::new(tree, Arc::clone(&registry)).validate(ValidateOptions {
        ignore_inactive: !args.check_inactive,
        ignore_resource_not_available: args.ignore_missing_resources,
    })?;
    tree = validated;
    tree.freeze();

    let loader = UnitLoader::new(Arc::new(tree), registry);
    let opts = RunOptions {
        tier: args.tier,
        include: compile_patterns(&args.match_)?,
        exclude: compile_patterns(&args.exclude)?,
        controllers: args.controller,
    };

    let orchestrator = ProcessOrchestrator::new(&loader, &opts, args.verbose)?;
    if orchestrator.is_empty() {
        warn!("no process matched the selection, exiting");
        return Ok(());
    }
    orchestrator.start()?;
    info!("{} controller group(s) running", orchestrator.len());

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    for outcome in orchestrator.stop() {
        match outcome {
            StopOutcome::Stopped => {}
            StopOutcome::Unsupported => warn!("a controller had no stop capability"),
            StopOutcome::Failed(e) => error!("a controller failed to stop: {e}"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logger::init(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

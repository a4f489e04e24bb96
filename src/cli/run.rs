use crate::clock::parse_timestamp;
use crate::config::{load_config, Config};
use crate::runs::{run_collection, run_selection, run_tracking_publish, RunContext, RunReport};
use std::path::{Path, PathBuf};
use tracing::info;

/// Which run the command line asked for.
#[derive(Debug, Clone)]
pub enum RunCommand {
    Collect { local_dir: Option<PathBuf> },
    Select { now: Option<String> },
    PublishTracking { local_dir: Option<PathBuf> },
}

pub fn require_config(config_path: Option<PathBuf>) -> Result<Config, Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            for location in crate::config::default_config_locations() {
                eprintln!("  {}", location.display());
            }
            eprintln!("\nUse --config <path> to specify a config file, or run 'tracklog config init' to generate one.");
            std::process::exit(1);
        }
    };

    info!(config_path = %config_path.display(), "Loading configuration");
    Ok(load_config(&config_path)?)
}

/// Execute one run. Returns whether the run succeeded; failures have
/// already been recorded in the store's error log.
pub async fn run(config_path: Option<PathBuf>, command: RunCommand) -> Result<bool, Box<dyn std::error::Error>> {
    let config = require_config(config_path)?;
    let ctx = RunContext::from_config(&config)?;

    let local_dir = |explicit: &Option<PathBuf>| -> PathBuf {
        explicit
            .clone()
            .unwrap_or_else(|| config.local_output_dir.clone())
    };

    let report: RunReport = match &command {
        RunCommand::Collect { local_dir: dir } => {
            let dir = local_dir(dir);
            check_dir(&dir);
            run_collection(&ctx, &dir).await
        }
        RunCommand::Select { now } => {
            let now = now.as_deref().map(parse_timestamp).transpose()?;
            run_selection(&ctx, now).await
        }
        RunCommand::PublishTracking { local_dir: dir } => {
            let dir = local_dir(dir);
            check_dir(&dir);
            run_tracking_publish(&ctx, &dir).await
        }
    };

    println!("{}", report);
    Ok(report.success)
}

fn check_dir(dir: &Path) {
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "Local output directory does not exist");
    }
}

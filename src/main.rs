use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracklog::cli::run::RunCommand;

#[derive(Parser)]
#[command(name = "tracklog")]
#[command(about = "Group numbering and tracking bookkeeping for scheduled crawl runs", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Number and publish the output of a collection run
    Collect {
        #[arg(long)]
        local_dir: Option<PathBuf>,
    },
    /// Pick groups inside the tracking window and write the post id list
    Select {
        /// Evaluate the window at this time (YYYY-MM-DD-HH-MM-SS)
        #[arg(long)]
        now: Option<String>,
    },
    /// Publish the output of a tracking run and update tracking status
    PublishTracking {
        #[arg(long)]
        local_dir: Option<PathBuf>,
    },
    /// Show how often each group has been tracked
    Status,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tracklog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = tracklog::config::resolve_config_path(cli.config.as_deref());

    let run_command = match cli.command {
        Commands::Collect { local_dir } => RunCommand::Collect { local_dir },
        Commands::Select { now } => RunCommand::Select { now },
        Commands::PublishTracking { local_dir } => RunCommand::PublishTracking { local_dir },
        Commands::Status => {
            return tracklog::cli::status::show(config_path).await;
        }
        Commands::Config { action } => {
            return match action {
                ConfigAction::Init { stdout } => tracklog::cli::config::init(stdout),
                ConfigAction::Validate => tracklog::cli::config::validate(config_path),
            };
        }
    };

    let succeeded = tracklog::cli::run::run(config_path, run_command).await?;
    if !succeeded {
        std::process::exit(2);
    }

    Ok(())
}

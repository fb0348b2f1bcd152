//! Buckos rc binary.
//!
//! Runs the scripts for a runlevel taken from `--runlevel` or `RUNLEVEL`.

use buckos_rc::{logging, Init, RcConfig, Runlevel, ServiceCatalog};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "rc",
    about = "Buckos rc - runlevel service runner",
    version,
    author
)]
struct Cli {
    /// Runlevel to enter (0-9), defaults to $RUNLEVEL
    #[arg(short, long)]
    runlevel: Option<String>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Services directory
    #[arg(short, long)]
    services_dir: Option<PathBuf>,

    /// Log file
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the services for the runlevel
    Run,

    /// Show the services for the runlevel in execution order
    List {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let runlevel = match cli.runlevel.as_deref() {
        Some(value) => value.parse::<Runlevel>()?,
        None => Runlevel::from_env()?,
    };

    let mut config = RcConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.services_dir {
        config.services_dir = dir;
    }
    if let Some(file) = cli.log_file {
        config.log_file = file;
    }

    match cli.command {
        Some(Commands::Run) | None => run(config, runlevel).await,
        Some(Commands::List { json }) => list(&config, runlevel, json),
    }
}

/// Run the runlevel.
async fn run(config: RcConfig, runlevel: Runlevel) -> anyhow::Result<()> {
    let target = logging::init(&config.log_file);
    info!(sink = ?target, log_file = %config.log_file.display(), "Logging initialized");

    let init = Init::new(config, runlevel);
    if let Err(e) = init.cancel_flag().listen_for_signals() {
        // Not fatal: the run still completes, it just can't be interrupted.
        error!(error = %e, "Failed to set up signal handlers");
    }

    let report = init.run().await?;
    info!(
        runlevel = %report.runlevel,
        ran = report.services.len(),
        succeeded = report.succeeded(),
        skipped = report.skipped,
        "Done"
    );

    Ok(())
}

/// Print the catalog without running anything.
fn list(config: &RcConfig, runlevel: Runlevel, json: bool) -> anyhow::Result<()> {
    logging::init_stderr();

    let catalog = ServiceCatalog::discover(&config.services_dir, runlevel)?;

    if json {
        println!("{}", serde_json::to_string_pretty(catalog.services())?);
        return Ok(());
    }

    if catalog.is_empty() {
        println!("No services for runlevel {}", runlevel);
    } else {
        println!("Services for runlevel {}:", runlevel);
        for service in &catalog {
            println!("  {:<8} {:<24} {}", service.ordering, service.name, service.path.display());
        }
    }

    Ok(())
}

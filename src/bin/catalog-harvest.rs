//! catalog-harvest: rebuild the archive catalog, export it, download its page scans.

use catalog_harvest::{Config, Harvester, HexCase, RunMode, run_with_shutdown};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "catalog-harvest")]
#[command(about = "Rebuild a four-level archive catalog, export it as CSV and download its images")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbosity level (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, rebuild and write the combined CSV
    Combine,
    /// Fetch, rebuild and download page images under <output-dir>/<letter>/<sheet>/
    Download,
    /// Export and download concurrently over one hierarchy
    Run,
    /// Fetch pages only, write the sorted page list and download under <output-dir>/<parent>/
    Flat,
}

/// Flags that override the configuration file
#[derive(clap::Args)]
struct Overrides {
    /// Catalog API base URL
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Image server base URL
    #[arg(long, global = true)]
    image_base: Option<String>,

    /// Root directory for downloaded images
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// CSV output path (the page list in flat mode)
    #[arg(long, global = true)]
    output_file: Option<PathBuf>,

    /// Download pool width
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Hex filename case (lower or upper)
    #[arg(long, global = true)]
    hex_case: Option<HexCase>,

    /// Restrict downloads to this parent id (repeatable)
    #[arg(long = "parent", value_name = "ID", global = true)]
    parents: Vec<String>,

    /// Retries per request for transient failures
    #[arg(long, global = true)]
    retries: Option<u32>,

    /// Stop starting new downloads after this many seconds
    #[arg(long, global = true)]
    deadline_secs: Option<u64>,
}

impl Overrides {
    fn apply(self, config: &mut Config, flat: bool) {
        if let Some(api_base) = self.api_base {
            config.api.base_url = api_base;
        }
        if let Some(image_base) = self.image_base {
            config.download.image_base_url = image_base;
        }
        if let Some(output_dir) = self.output_dir {
            config.download.output_dir = output_dir;
        }
        if let Some(output_file) = self.output_file {
            if flat {
                config.export.flat_output_file = output_file;
            } else {
                config.export.output_file = output_file;
            }
        }
        if let Some(concurrency) = self.concurrency {
            config.download.max_concurrent_downloads = concurrency;
        }
        if self.hex_case.is_some() {
            config.download.hex_case = self.hex_case;
        }
        if !self.parents.is_empty() {
            config.download.parent_allow_list = self.parents;
        }
        if let Some(retries) = self.retries {
            config.api.retry.max_attempts = retries;
            config.download.retry.max_attempts = retries;
        }
        if let Some(secs) = self.deadline_secs {
            config.download.deadline = Some(Duration::from_secs(secs));
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> catalog_harvest::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let flat = matches!(cli.command, Commands::Flat);
    cli.overrides.apply(&mut config, flat);

    let harvester = Harvester::new(config)?;
    let report = match cli.command {
        Commands::Combine => run_with_shutdown(&harvester, harvester.run(RunMode::Combine)).await,
        Commands::Download => {
            run_with_shutdown(&harvester, harvester.run(RunMode::Download)).await
        }
        Commands::Run => run_with_shutdown(&harvester, harvester.run(RunMode::Full)).await,
        Commands::Flat => run_with_shutdown(&harvester, harvester.run_flat()).await,
    }?;

    println!("{report}");
    Ok(())
}

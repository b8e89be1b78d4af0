//! linkfetch CLI - fetch a list of links concurrently
//!
//! Reads a link file of `<link> <file name>` lines and downloads every link
//! into the output directory under a shared speed limit.

mod commands;
mod output;
mod progress;

use anyhow::Result;
use clap::Parser;
use linkfetch_types::FetchSettings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// linkfetch - concurrent, rate-limited link downloader
#[derive(Parser)]
#[command(name = "linkfetch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of downloading threads
    #[arg(
        short = 'n',
        long = "nthreads",
        env = "LINKFETCH_THREADS",
        default_value = "1",
        value_parser = linkfetch_core::parse_concurrency
    )]
    threads: usize,

    /// Upper limit of downloading speed in bytes per second
    /// (examples: 1000, 100k, 5m; 0 means unlimited)
    #[arg(
        short = 'l',
        long = "speedlimit",
        env = "LINKFETCH_SPEED_LIMIT",
        default_value = "0",
        value_parser = linkfetch_core::parse_speed_limit
    )]
    speed_limit: u64,

    /// Path to a file with links to download
    #[arg(short, long)]
    file: PathBuf,

    /// Path to a folder for downloaded files to save
    #[arg(short, long, env = "LINKFETCH_OUTPUT_DIR", default_value = ".")]
    output: PathBuf,

    /// Directory for in-progress staging files
    #[arg(long, env = "LINKFETCH_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Report format
    #[arg(long, default_value = "human")]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

fn init_logging(verbose: bool) {
    // Quiet by default so log lines don't tear the progress bars
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = FetchSettings {
        concurrency: cli.threads,
        speed_limit: cli.speed_limit,
        temp_dir: cli.temp_dir.unwrap_or_else(std::env::temp_dir),
        ..FetchSettings::default()
    };

    commands::fetch_links(&cli.file, &cli.output, settings, cli.format).await
}

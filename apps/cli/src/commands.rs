//! CLI command implementations

use crate::output;
use crate::progress::DownloadProgress;
use crate::OutputFormat;
use anyhow::{Context, Result};
use console::style;
use linkfetch_core::{DownloadCoordinator, SourceMapping};
use linkfetch_types::FetchSettings;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Download every link of `link_file` into `output_dir` and print the report
pub async fn fetch_links(
    link_file: &Path,
    output_dir: &Path,
    settings: FetchSettings,
    format: OutputFormat,
) -> Result<()> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("could not create output dir '{}'", output_dir.display()))?;

    info!(
        "threads = {}, speed limit = {}, file = {:?}, output = {:?}",
        settings.concurrency, settings.speed_limit, link_file, output_dir
    );

    let parsed = SourceMapping::from_file(link_file, output_dir)
        .await
        .with_context(|| format!("could not read input file '{}'", link_file.display()))?;

    if let OutputFormat::Human = format {
        if !parsed.skipped.is_empty() {
            eprintln!(
                "{} {} line(s) of '{}' skipped",
                style("!").yellow().bold(),
                parsed.skipped.len(),
                link_file.display()
            );
        }
        println!("Started downloading {} link(s)...", parsed.mapping.len());
    }

    let coordinator = DownloadCoordinator::new(settings)?;

    let progress = match format {
        OutputFormat::Human => Some(DownloadProgress::new(&parsed.mapping)?),
        OutputFormat::Json => None,
    };
    let progress_handle = progress.map(|p| p.spawn(coordinator.subscribe()));

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping downloads");
            trigger.cancel();
        }
    });

    let result = coordinator.run_until(parsed.mapping, shutdown).await;

    // Closes the event channel so the progress task drains and exits
    drop(coordinator);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }

    let report = result.context("downloads did not finish")?;
    output::print_report(&report, format)
}

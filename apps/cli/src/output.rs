//! Output formatting utilities

use crate::OutputFormat;
use console::style;
use linkfetch_types::{FetchStatus, RunReport};
use std::time::Duration;

/// Print the final run report in the specified format
pub fn print_report(report: &RunReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Human => {
            for outcome in report
                .outcomes
                .iter()
                .filter(|o| o.status != FetchStatus::Succeeded)
            {
                println!(
                    "{} {} {}: {}",
                    style("✗").red().bold(),
                    outcome.source,
                    outcome.status,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }

            println!(
                "TOTAL: ran for {}, downloaded {} ({} of {} links)",
                format_elapsed(report.elapsed),
                format_bytes(report.total_bytes),
                report.succeeded(),
                report.outcomes.len()
            );
        }
    }
    Ok(())
}

/// Format bytes as human-readable
pub fn format_bytes(bytes: u64) -> String {
    human_bytes::human_bytes(bytes as f64)
}

/// Format a run duration as human-readable
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();

    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}.{:03}s", secs, millis)
    }
}

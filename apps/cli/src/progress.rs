//! Progress bar utilities for CLI downloads

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use linkfetch_core::SourceMapping;
use linkfetch_types::{FetchEvent, FetchStatus};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Manages one progress line per source
pub struct DownloadProgress {
    // Keeps the bars drawn together
    _multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
}

impl DownloadProgress {
    /// Create a queued progress line for every source of the mapping
    pub fn new(mapping: &SourceMapping) -> anyhow::Result<Self> {
        let multi = MultiProgress::new();
        let bar_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {bytes:>10} ({bytes_per_sec}) {wide_msg}")?;

        let mut bars = HashMap::new();
        for (source, _) in mapping.iter() {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(bar_style.clone());
            pb.set_message(format!("{} {}", style("queued").dim(), source));
            bars.insert(source.to_string(), pb);
        }

        Ok(Self {
            _multi: multi,
            bars,
        })
    }

    /// Update a progress line from an event
    pub fn handle_event(&self, event: &FetchEvent) {
        match event {
            FetchEvent::Started { source } => {
                if let Some(pb) = self.bars.get(source) {
                    pb.set_message(source.clone());
                    pb.enable_steady_tick(Duration::from_millis(120));
                }
            }

            FetchEvent::Progress { source, bytes } => {
                if let Some(pb) = self.bars.get(source) {
                    pb.set_position(*bytes);
                }
            }

            FetchEvent::Finished {
                source,
                status,
                error,
            } => {
                let Some(pb) = self.bars.get(source) else {
                    return;
                };

                match status {
                    FetchStatus::Succeeded => {
                        pb.finish_with_message(format!("{} {}", style("✓").green().bold(), source));
                    }
                    FetchStatus::Cancelled => {
                        pb.abandon_with_message(format!("{} Cancelled: {}", style("○").dim(), source));
                    }
                    _ => {
                        pb.abandon_with_message(format!(
                            "{} {}: {}",
                            style("✗").red().bold(),
                            source,
                            error.as_deref().unwrap_or("Unknown error")
                        ));
                    }
                }
            }
        }
    }

    /// Follow the event stream until every sender has been dropped
    pub fn spawn(self, mut events: broadcast::Receiver<FetchEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => self.handle_event(&event),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

//! Download coordinator - runs one fetch task per unique source
//!
//! This is the top-level entry point of the engine:
//! - Builds the shared HTTP client, rate limiter and byte counter
//! - Schedules every source onto a bounded pool of workers
//! - Waits on the completion barrier and reports the run

use crate::engine::{ByteCounter, CompletionBarrier, FetchTask, RateLimiter};
use crate::error::LinkfetchError;
use crate::mapping::SourceMapping;
use linkfetch_types::{FetchEvent, FetchSettings, RunReport};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Coordinates a batch of fetches
pub struct DownloadCoordinator {
    /// HTTP client
    client: Client,
    settings: FetchSettings,
    /// Event broadcaster
    event_tx: broadcast::Sender<FetchEvent>,
}

impl DownloadCoordinator {
    /// Create a new coordinator
    pub fn new(settings: FetchSettings) -> Result<Self, LinkfetchError> {
        if settings.concurrency == 0 {
            return Err(LinkfetchError::InvalidConcurrency("0".to_string()));
        }

        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .read_timeout(Duration::from_secs(settings.read_timeout_secs))
            .build()?;

        let (event_tx, _) = broadcast::channel(1000);

        Ok(Self {
            client,
            settings,
            event_tx,
        })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Subscribe to fetch events
    pub fn subscribe(&self) -> broadcast::Receiver<FetchEvent> {
        self.event_tx.subscribe()
    }

    /// Fetch every source of `mapping` and fan it out to its destinations
    pub async fn run(&self, mapping: SourceMapping) -> Result<RunReport, LinkfetchError> {
        self.run_until(mapping, CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but stops early when `shutdown` is cancelled
    ///
    /// On shutdown every task is cancelled and cleans up its staging file;
    /// once all of them have finished the run fails with
    /// [`LinkfetchError::Interrupted`].
    pub async fn run_until(
        &self,
        mapping: SourceMapping,
        shutdown: CancellationToken,
    ) -> Result<RunReport, LinkfetchError> {
        let start = Instant::now();
        let task_count = mapping.len();
        tokio::fs::create_dir_all(&self.settings.temp_dir).await?;

        let rate_limiter = RateLimiter::new(self.settings.speed_limit);
        let bytes = ByteCounter::new();
        let barrier = CompletionBarrier::new(task_count);
        let workers = Arc::new(Semaphore::new(self.settings.concurrency));

        if rate_limiter.is_unlimited() {
            info!(
                "Fetching {} sources with {} workers, no speed limit",
                task_count, self.settings.concurrency
            );
        } else {
            info!(
                "Fetching {} sources with {} workers, limited to {} bytes/sec",
                task_count, self.settings.concurrency, self.settings.speed_limit
            );
        }

        let mut join_set = JoinSet::new();
        for (source, destinations) in mapping {
            let task = FetchTask::new(
                source,
                destinations,
                &self.settings.temp_dir,
                self.client.clone(),
                rate_limiter.clone(),
                bytes.clone(),
                shutdown.child_token(),
                self.event_tx.clone(),
            );
            let arrival = barrier.arrival();
            let workers = workers.clone();

            join_set.spawn(async move {
                let _arrival = arrival;
                task.run_with_permit(workers).await
            });
        }

        // A run that completed is never reported as interrupted
        let interrupted = tokio::select! {
            biased;
            _ = barrier.wait() => false,
            _ = shutdown.cancelled() => true,
        };
        if interrupted {
            warn!("Interrupted, waiting for fetch tasks to clean up");
            barrier.wait().await;
        }

        let mut outcomes = Vec::with_capacity(task_count);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("Fetch task panicked: {}", e),
            }
        }
        outcomes.sort_by(|a, b| a.source.cmp(&b.source));

        let report = RunReport {
            elapsed: start.elapsed(),
            total_bytes: bytes.total(),
            outcomes,
        };
        info!(
            "Run finished in {:?}: {} succeeded, {} failed, {} cancelled, {} bytes",
            report.elapsed,
            report.succeeded(),
            report.failed(),
            report.cancelled(),
            report.total_bytes
        );

        if interrupted {
            return Err(LinkfetchError::Interrupted);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let settings = FetchSettings {
            concurrency: 0,
            ..FetchSettings::default()
        };
        assert!(matches!(
            DownloadCoordinator::new(settings),
            Err(LinkfetchError::InvalidConcurrency(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_mapping_finishes_immediately() {
        let coordinator = DownloadCoordinator::new(FetchSettings::default()).unwrap();
        let report = coordinator.run(SourceMapping::new()).await.unwrap();

        assert_eq!(report.total_bytes, 0);
        assert!(report.outcomes.is_empty());
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_completed_run_wins_over_shutdown() {
        let coordinator = DownloadCoordinator::new(FetchSettings::default()).unwrap();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        // Barrier and shutdown are both ready on the first poll
        for _ in 0..16 {
            let report = coordinator
                .run_until(SourceMapping::new(), shutdown.clone())
                .await
                .unwrap();
            assert!(report.outcomes.is_empty());
        }
    }
}

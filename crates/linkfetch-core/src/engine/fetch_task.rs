//! Fetch task - downloads one source and fans it out to its destinations
//!
//! The body is streamed into a task-exclusive staging file, chunk by chunk,
//! through the shared rate limiter. Only a fully received body is promoted
//! to the destinations; anything else leaves no destination files behind.

use crate::engine::{staging, ByteCounter, RateLimiter};
use crate::error::LinkfetchError;
use futures::StreamExt;
use linkfetch_types::{FetchEvent, FetchOutcome, FetchStatus};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Chunk size used when no rate limit is configured (20 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 2_097_152;

/// A single source download
pub struct FetchTask {
    source: String,
    destinations: Vec<PathBuf>,
    staging_path: PathBuf,
    client: Client,
    rate_limiter: RateLimiter,
    bytes: ByteCounter,
    chunk_size: usize,
    cancelled: CancellationToken,
    event_tx: broadcast::Sender<FetchEvent>,
    status: FetchStatus,
    received: u64,
}

impl FetchTask {
    /// Create a new fetch task
    ///
    /// `destinations` must be non-empty; its first entry receives the staging
    /// file and names it.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: String,
        destinations: Vec<PathBuf>,
        temp_dir: &Path,
        client: Client,
        rate_limiter: RateLimiter,
        bytes: ByteCounter,
        cancelled: CancellationToken,
        event_tx: broadcast::Sender<FetchEvent>,
    ) -> Self {
        let staging_path = match destinations.first() {
            Some(first) => staging::staging_path(temp_dir, first),
            None => staging::staging_path(temp_dir, Path::new("download")),
        };
        let chunk_size = if rate_limiter.is_unlimited() {
            DEFAULT_CHUNK_SIZE
        } else {
            usize::try_from(rate_limiter.capacity())
                .unwrap_or(DEFAULT_CHUNK_SIZE)
                .max(1)
        };

        Self {
            source,
            destinations,
            staging_path,
            client,
            rate_limiter,
            bytes,
            chunk_size,
            cancelled,
            event_tx,
            status: FetchStatus::Pending,
            received: 0,
        }
    }

    pub fn status(&self) -> FetchStatus {
        self.status
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// Wait for a worker slot, then run the fetch
    ///
    /// Cancellation while queued ends the task as `Cancelled` without
    /// touching the network.
    pub async fn run_with_permit(self, workers: Arc<Semaphore>) -> FetchOutcome {
        let permit: Option<OwnedSemaphorePermit> = tokio::select! {
            permit = workers.acquire_owned() => permit.ok(),
            _ = self.cancelled.cancelled() => None,
        };
        // A closed pool is treated like cancellation
        let Some(permit) = permit else {
            return self.finish(Err(LinkfetchError::Cancelled));
        };

        let outcome = self.run().await;
        drop(permit);
        outcome
    }

    /// Run the fetch to a terminal state
    pub async fn run(mut self) -> FetchOutcome {
        self.status = FetchStatus::InFlight;
        info!("Starting fetch of {} -> {:?}", self.source, self.destinations);
        let _ = self.event_tx.send(FetchEvent::Started {
            source: self.source.clone(),
        });

        let result = self.transfer().await;
        if result.is_err() {
            staging::discard(&self.staging_path).await;
        }
        self.finish(result)
    }

    /// Stream the body into the staging file and promote it
    async fn transfer(&mut self) -> Result<(), LinkfetchError> {
        let response = tokio::select! {
            response = self.client.get(&self.source).send() => response?,
            _ = self.cancelled.cancelled() => return Err(LinkfetchError::Cancelled),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(LinkfetchError::ServerError {
                status: status.as_u16(),
                message: format!("GET {} returned {}", self.source, status),
            });
        }

        let mut file = File::create(&self.staging_path).await?;
        debug!("Streaming {} into {:?}", self.source, self.staging_path);

        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                next = stream.next() => next,
                _ = self.cancelled.cancelled() => return Err(LinkfetchError::Cancelled),
            };
            let Some(chunk) = next else { break };
            let chunk = chunk?;

            // Re-slice so no single debit exceeds the bucket capacity
            for piece in chunk.chunks(self.chunk_size) {
                file.write_all(piece).await?;

                let len = piece.len() as u64;
                self.bytes.add(len);
                self.received += len;

                let waited = tokio::select! {
                    waited = self.rate_limiter.consume(len) => waited?,
                    _ = self.cancelled.cancelled() => return Err(LinkfetchError::Cancelled),
                };
                if !waited.is_zero() {
                    debug!("{}: throttled for {:?}", self.source, waited);
                }
            }

            let _ = self.event_tx.send(FetchEvent::Progress {
                source: self.source.clone(),
                bytes: self.received,
            });
        }

        // Flush and sync to disk
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        staging::promote(&self.staging_path, &self.destinations).await
    }

    /// Record the terminal state and build the outcome
    fn finish(mut self, result: Result<(), LinkfetchError>) -> FetchOutcome {
        let error = match result {
            Ok(()) => {
                self.status = FetchStatus::Succeeded;
                info!("Finished {} ({} bytes)", self.source, self.received);
                None
            }
            Err(e) if e.is_cancellation() => {
                self.status = FetchStatus::Cancelled;
                error!("{} cancelled: {}", self.source, e);
                Some(e.to_string())
            }
            Err(e) => {
                self.status = FetchStatus::Failed;
                error!("{} failed: {}", self.source, e);
                Some(e.to_string())
            }
        };

        let _ = self.event_tx.send(FetchEvent::Finished {
            source: self.source.clone(),
            status: self.status,
            error: error.clone(),
        });

        FetchOutcome {
            source: self.source,
            destinations: self.destinations,
            status: self.status,
            bytes: self.received,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(limiter: RateLimiter, cancelled: CancellationToken) -> FetchTask {
        let (event_tx, _) = broadcast::channel(16);
        FetchTask::new(
            // Nothing listens on the discard port
            "http://127.0.0.1:9/file.bin".to_string(),
            vec![PathBuf::from("/out/file.bin")],
            Path::new("/tmp"),
            Client::new(),
            limiter,
            ByteCounter::new(),
            cancelled,
            event_tx,
        )
    }

    #[test]
    fn test_chunk_size_follows_rate_limit() {
        let limited = task(RateLimiter::new(4096), CancellationToken::new());
        assert_eq!(limited.chunk_size, 4096);
        assert_eq!(limited.status(), FetchStatus::Pending);

        let unlimited = task(RateLimiter::unlimited(), CancellationToken::new());
        assert_eq!(unlimited.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(unlimited
            .staging_path()
            .to_string_lossy()
            .contains("file.bin-"));
    }

    #[tokio::test]
    async fn test_cancelled_while_queued() {
        let cancelled = CancellationToken::new();
        let fetch = task(RateLimiter::unlimited(), cancelled.clone());
        let staging = fetch.staging_path().to_path_buf();

        // No permits: the task can only leave through cancellation
        let workers = Arc::new(Semaphore::new(0));
        cancelled.cancel();
        let outcome = fetch.run_with_permit(workers).await;

        assert_eq!(outcome.status, FetchStatus::Cancelled);
        assert_eq!(outcome.bytes, 0);
        assert!(!staging.exists());
    }

    #[tokio::test]
    async fn test_connection_failure_is_failed() {
        let fetch = task(RateLimiter::unlimited(), CancellationToken::new());
        let outcome = fetch.run().await;

        assert!(matches!(
            outcome.status,
            FetchStatus::Failed | FetchStatus::Cancelled
        ));
        assert!(outcome.error.is_some());
        assert!(!Path::new("/out/file.bin").exists());
    }
}

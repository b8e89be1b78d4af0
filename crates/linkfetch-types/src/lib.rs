//! Shared types for linkfetch
//!
//! This crate contains the data structures shared between the core
//! fetch engine and the CLI.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Fetch Types
// ============================================================================

/// Lifecycle of a single fetch task
///
/// A task starts `Pending`, becomes `InFlight` once a worker picks it up,
/// and ends in exactly one of the three terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Pending,
    InFlight,
    Succeeded,
    Failed,
    Cancelled,
}

impl FetchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FetchStatus::Succeeded | FetchStatus::Failed | FetchStatus::Cancelled
        )
    }
}

impl std::fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FetchStatus::Pending => "pending",
            FetchStatus::InFlight => "in-flight",
            FetchStatus::Succeeded => "succeeded",
            FetchStatus::Failed => "failed",
            FetchStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Final result of one fetch task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub source: String,
    pub destinations: Vec<PathBuf>,
    pub status: FetchStatus,
    /// Bytes streamed from the network for this source
    pub bytes: u64,
    pub error: Option<String>,
}

/// Aggregate statistics of a coordinator run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub elapsed: Duration,
    pub total_bytes: u64,
    pub outcomes: Vec<FetchOutcome>,
}

impl RunReport {
    fn count(&self, status: FetchStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(FetchStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(FetchStatus::Failed)
    }

    pub fn cancelled(&self) -> usize {
        self.count(FetchStatus::Cancelled)
    }

    /// True when every scheduled source completed successfully
    pub fn is_complete(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.status == FetchStatus::Succeeded)
    }
}

// ============================================================================
// Settings Types
// ============================================================================

/// Configuration consumed by the download coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Maximum number of sources fetched at the same time
    pub concurrency: usize,
    /// Aggregate speed limit in bytes per second (0 = unlimited)
    pub speed_limit: u64,
    /// Directory holding staging files while a fetch is in progress
    pub temp_dir: PathBuf,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            speed_limit: 0,
            temp_dir: std::env::temp_dir(),
            connect_timeout_secs: 3,
            read_timeout_secs: 3,
            user_agent: format!("linkfetch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Events emitted by the core while a run is in progress
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum FetchEvent {
    Started {
        source: String,
    },
    Progress {
        source: String,
        /// Bytes streamed so far for this source
        bytes: u64,
    },
    Finished {
        source: String,
        status: FetchStatus,
        error: Option<String>,
    },
}

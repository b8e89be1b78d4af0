//! Error types for linkfetch core

use thiserror::Error;

/// Errors that can occur in linkfetch core
#[derive(Debug, Error)]
pub enum LinkfetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid speed limit '{0}': expected a non-negative integer with an optional k or m suffix")]
    InvalidSpeedLimit(String),

    #[error("Invalid thread count '{0}': expected a positive integer")]
    InvalidConcurrency(String),

    #[error("Invalid rate limit: {0}")]
    InvalidRateLimit(String),

    #[error("Requested {requested} tokens but the bucket only holds {capacity}")]
    ExceedsCapacity { requested: u64, capacity: u64 },

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Fetch was cancelled")]
    Cancelled,

    #[error("Interrupted while waiting for fetches to complete")]
    Interrupted,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl LinkfetchError {
    /// Check if this error means the transfer was cancelled rather than failed
    ///
    /// Transport timeouts count as cancellation.
    pub fn is_cancellation(&self) -> bool {
        match self {
            LinkfetchError::Cancelled => true,
            LinkfetchError::Network(e) => e.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_classification() {
        assert!(LinkfetchError::Cancelled.is_cancellation());
        assert!(!LinkfetchError::Interrupted.is_cancellation());
        assert!(!LinkfetchError::ServerError {
            status: 503,
            message: "unavailable".into()
        }
        .is_cancellation());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert!(!LinkfetchError::from(io).is_cancellation());
    }
}

//! Token bucket rate limiter for aggregate speed control
//!
//! Fixed-rate bucket: once per `period` the bucket is topped up by
//! `token_rate` tokens, never holding more than `capacity`. A single
//! limiter is shared by every fetch task of a run, so it bounds the
//! combined throughput, not the throughput of each task.

use crate::error::LinkfetchError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Global rate limiter using a fixed-rate token bucket
#[derive(Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<RateLimiterState>>,
    /// Maximum tokens held at once, also the largest allowed single request
    capacity: u64,
    is_unlimited: bool,
}

struct RateLimiterState {
    /// Current available tokens
    tokens: u64,
    /// Tokens added per period
    token_rate: u64,
    period: Duration,
    /// Earliest instant at which the next refill may happen
    next_refill: Instant,
    capacity: u64,
}

impl RateLimiterState {
    /// Add one period's worth of tokens if the refill deadline has passed
    fn refill(&mut self, now: Instant) {
        if now < self.next_refill {
            return;
        }

        self.next_refill += self.period;
        if self.next_refill <= now {
            // Idle for more than a period: missed refills are not banked
            self.next_refill = now + self.period;
        }

        // The post-refill total is clamped, not just the added amount
        self.tokens = self
            .tokens
            .saturating_add(self.token_rate)
            .min(self.capacity);
    }

    fn try_debit(&mut self, quantity: u64, now: Instant) -> bool {
        if self.tokens < quantity {
            self.refill(now);
        }

        if self.tokens >= quantity {
            self.tokens -= quantity;
            true
        } else {
            false
        }
    }
}

impl RateLimiter {
    /// Create a rate limiter allowing `bytes_per_second` bytes per second
    ///
    /// The bucket holds one second worth of tokens. A limit of 0 means unlimited.
    pub fn new(bytes_per_second: u64) -> Self {
        if bytes_per_second == 0 {
            return Self::unlimited();
        }

        Self::build(bytes_per_second, bytes_per_second, Duration::from_secs(1))
    }

    /// Create a bucket with an arbitrary capacity, refill amount and period
    pub fn with_period(
        capacity: u64,
        token_rate: u64,
        period: Duration,
    ) -> Result<Self, LinkfetchError> {
        if token_rate == 0 {
            return Err(LinkfetchError::InvalidRateLimit(
                "token rate must be positive".to_string(),
            ));
        }
        if period.is_zero() {
            return Err(LinkfetchError::InvalidRateLimit(
                "refill period must be positive".to_string(),
            ));
        }

        Ok(Self::build(capacity, token_rate, period))
    }

    /// Create an unlimited rate limiter (no throttling)
    pub fn unlimited() -> Self {
        let mut limiter = Self::build(u64::MAX, u64::MAX, Duration::from_secs(1));
        limiter.is_unlimited = true;
        limiter
    }

    fn build(capacity: u64, token_rate: u64, period: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(RateLimiterState {
                // Empty bucket with an immediately due refill
                tokens: 0,
                token_rate,
                period,
                next_refill: Instant::now(),
                capacity,
            })),
            capacity,
            is_unlimited: false,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn is_unlimited(&self) -> bool {
        self.is_unlimited
    }

    /// Debit `quantity` tokens, waiting until they are available
    ///
    /// Returns the time spent waiting, which is zero when the tokens were
    /// already in the bucket. Requests larger than the capacity can never be
    /// satisfied and are rejected immediately.
    pub async fn consume(&self, quantity: u64) -> Result<Duration, LinkfetchError> {
        if self.is_unlimited {
            return Ok(Duration::ZERO);
        }
        if quantity > self.capacity {
            return Err(LinkfetchError::ExceedsCapacity {
                requested: quantity,
                capacity: self.capacity,
            });
        }

        let start = Instant::now();
        let mut waited = false;

        loop {
            let deadline = {
                let mut state = self.state.lock().await;
                if state.try_debit(quantity, Instant::now()) {
                    return Ok(if waited {
                        start.elapsed()
                    } else {
                        Duration::ZERO
                    });
                }
                state.next_refill
            };

            // Sleep outside the lock so other consumers can still debit
            tokio::time::sleep_until(deadline).await;
            waited = true;
        }
    }

    /// Non-blocking debit
    /// Returns true if the tokens were taken, false otherwise
    pub async fn try_consume(&self, quantity: u64) -> bool {
        if self.is_unlimited {
            return true;
        }

        self.state.lock().await.try_debit(quantity, Instant::now())
    }
}

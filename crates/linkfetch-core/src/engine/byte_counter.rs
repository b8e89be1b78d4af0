//! Run-wide total of bytes transferred

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Additive accumulator shared by all fetch tasks of a run
#[derive(Clone, Debug, Default)]
pub struct ByteCounter {
    total: Arc<AtomicU64>,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, bytes: u64) {
        self.total.fetch_add(bytes, Ordering::AcqRel);
    }

    /// Read the accumulated total; meaningful once every task has finished
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }
}

//! Completion barrier - counts fetch tasks down to zero
//!
//! Each scheduled task holds an [`Arrival`] guard and arrives exactly once,
//! when the guard is dropped, whatever the task's outcome (including panics).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

/// Countdown from the number of scheduled tasks to zero
#[derive(Clone, Debug)]
pub struct CompletionBarrier {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    remaining: AtomicUsize,
    released: Notify,
}

impl CompletionBarrier {
    pub fn new(count: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                remaining: AtomicUsize::new(count),
                released: Notify::new(),
            }),
        }
    }

    /// Record one terminal transition
    pub fn arrive(&self) {
        let previous = self
            .inner
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        match previous {
            Ok(1) => self.inner.released.notify_waiters(),
            Ok(_) => {}
            Err(_) => warn!("Completion barrier signalled after it was released"),
        }
    }

    /// Guard that arrives at the barrier when dropped
    pub fn arrival(&self) -> Arrival {
        Arrival {
            barrier: self.clone(),
        }
    }

    /// Wait until every scheduled task has arrived
    pub async fn wait(&self) {
        loop {
            let released = self.inner.released.notified();
            tokio::pin!(released);
            // Register before checking so a concurrent release is not missed
            released.as_mut().enable();

            if self.inner.remaining.load(Ordering::Acquire) == 0 {
                return;
            }
            released.await;
        }
    }
}

/// Arrives at its barrier on drop
#[must_use = "dropping the guard arrives at the barrier immediately"]
#[derive(Debug)]
pub struct Arrival {
    barrier: CompletionBarrier,
}

impl Drop for Arrival {
    fn drop(&mut self) {
        self.barrier.arrive();
    }
}

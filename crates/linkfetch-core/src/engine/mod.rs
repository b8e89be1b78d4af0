//! Fetch Engine
//!
//! This module implements the concurrent fetch engine:
//! - Fixed-rate token bucket shared by all transfers
//! - One fetch task per unique source, bounded by a worker pool
//! - Staging files promoted to every destination on success
//! - Completion barrier and byte totals for the run report

mod byte_counter;
mod completion;
mod coordinator;
mod fetch_task;
mod rate_limiter;
pub mod staging;

pub use byte_counter::*;
pub use completion::*;
pub use coordinator::*;
pub use fetch_task::*;
pub use rate_limiter::*;

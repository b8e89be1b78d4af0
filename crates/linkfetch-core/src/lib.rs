//! Linkfetch Core - Fetch Engine
//!
//! This crate fetches a set of URLs concurrently under a shared speed
//! limit and writes each payload to every destination path requested
//! for it.

mod config;
mod engine;
mod error;
mod mapping;

pub use config::*;
pub use engine::*;
pub use error::*;
pub use mapping::*;

pub use linkfetch_types as types;

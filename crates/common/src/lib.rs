//! Snapreel Common Utilities
//!
//! Shared infrastructure for all Snapreel crates:
//! - Error types and result aliases
//! - Recording clock and frame tick scheduling
//! - Tracing/logging initialization
//! - Configuration loading
//! - External tool process helpers

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod process;

pub use clock::*;
pub use config::*;
pub use error::*;

//! dbtlens CLI library.
//!
//! This module exposes internal types for testing purposes.
//! The main entry point is the `dbtlens` binary.

pub mod check;
pub mod cli;
pub mod config;
pub mod input;
pub mod logging;
pub mod metadata;
pub mod output;
pub mod protocol;
pub mod schema;
pub mod server;

// Re-export commonly used types
pub use cli::Args;

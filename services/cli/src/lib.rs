//! services/cli/src/lib.rs
//!
//! Library half of the `study` binary: configuration, adapters and the
//! interactive shell, kept here so integration tests can drive them.

pub mod adapters;
pub mod config;
pub mod error;
pub mod logging;
pub mod results_log;
pub mod session;
pub mod shell;

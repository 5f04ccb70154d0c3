//! services/cli/src/error.rs
//!
//! Defines the primary error type for the `study` command-line service.

use crate::config::ConfigError;
use study_companion_core::ports::PortError;

/// The primary error type for the `study` service.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from the core or one of its ports.
    #[error("{0}")]
    Port(#[from] PortError),

    /// Represents a standard Input/Output error (terminal, log or results file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The rolling log file could not be set up.
    #[error("Could not set up logging: {0}")]
    Logging(#[from] tracing_appender::rolling::InitError),
}

//! services/cli/src/logging.rs
//!
//! The log file writer. stdout belongs to the prompt, so logs go to a file
//! that rolls over daily and keeps only the most recent few.

use crate::error::CliError;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

const KEPT_LOG_FILES: usize = 3;

/// A daily rolling appender next to `path`. `study.log` becomes
/// `study.<date>.log`, and files beyond the newest three are removed.
pub fn log_file_appender(path: &Path) -> Result<RollingFileAppender, CliError> {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("study");

    let mut builder = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(KEPT_LOG_FILES)
        .filename_prefix(prefix);
    if let Some(suffix) = path.extension().and_then(|ext| ext.to_str()) {
        builder = builder.filename_suffix(suffix);
    }
    Ok(builder.build(directory)?)
}

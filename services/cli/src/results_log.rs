//! services/cli/src/results_log.rs
//!
//! Append-only text log with one line per completed test.

use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use study_companion_core::domain::TestOutcome;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

#[derive(Clone, Debug)]
pub struct ResultsLog {
    path: PathBuf,
}

impl ResultsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends the score line for `outcome`, creating the file if needed.
    pub async fn append(&self, outcome: &TestOutcome) -> std::io::Result<()> {
        let line = format_line(Local::now().naive_local(), outcome);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        info!("Recorded test result in {}: {}", self.path.display(), line.trim_end());
        Ok(())
    }
}

fn format_line(timestamp: NaiveDateTime, outcome: &TestOutcome) -> String {
    format!(
        "{} - score: {}/{} ({:.0}%)\n",
        timestamp.format("%Y-%m-%dT%H:%M:%S"),
        outcome.correct,
        outcome.total,
        outcome.percentage()
    )
}

//! services/cli/src/adapters/json_repo.rs
//!
//! This module contains the storage adapter, which is the concrete implementation
//! of the `QuestionRepository` port from the `core` crate. The whole collection
//! lives in one pretty-printed JSON array on disk.

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use study_companion_core::domain::{Question, QuestionKind, QuestionSource, QuestionStats};
use study_companion_core::ports::{PortError, PortResult, QuestionRepository};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A file adapter that implements the `QuestionRepository` port.
#[derive(Clone, Debug)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    /// Creates a new `JsonFileRepository` over the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Moves an unreadable questions file out of the way so that a fresh
    /// collection never overwrites it. Returns where the file went.
    pub async fn quarantine(&self) -> PortResult<Option<PathBuf>> {
        if fs::metadata(&self.path).await.is_err() {
            return Ok(None);
        }

        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".corrupt-{}", Local::now().format("%Y%m%d%H%M%S")));
        let target = self.path.with_file_name(name);

        fs::rename(&self.path, &target)
            .await
            .map_err(|e| self.error("move aside", e))?;
        warn!(
            "Moved unreadable questions file {} to {}",
            self.path.display(),
            target.display()
        );
        Ok(Some(target))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn error(&self, action: &str, reason: impl std::fmt::Display) -> PortError {
        PortError::Persistence(format!(
            "failed to {} {}: {}",
            action,
            self.path.display(),
            reason
        ))
    }
}

//=========================================================================================
// "Impure" Storage Record Structs
//=========================================================================================

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum QuestionTypeRecord {
    Mcq,
    Freeform,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum SourceRecord {
    Llm,
    Manual,
}

#[derive(Serialize, Deserialize, Default, Debug)]
struct StatsRecord {
    #[serde(default)]
    times_shown: u32,
    #[serde(default)]
    times_correct: u32,
}

#[derive(Serialize, Deserialize, Debug)]
struct QuestionRecord {
    id: String,
    topic: String,
    text: String,
    question_type: QuestionTypeRecord,
    source: SourceRecord,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    correct_option_index: Option<usize>,
    #[serde(default)]
    reference_answer: Option<String>,
    #[serde(default)]
    stats: StatsRecord,
}

fn default_active() -> bool {
    true
}

impl QuestionRecord {
    fn to_domain(self) -> PortResult<Question> {
        let kind = match self.question_type {
            QuestionTypeRecord::Mcq => QuestionKind::Mcq {
                options: self.options,
                correct_index: self.correct_option_index.ok_or_else(|| {
                    PortError::Validation(
                        "a multiple-choice question must define correct_option_index".to_string(),
                    )
                })?,
            },
            QuestionTypeRecord::Freeform => QuestionKind::Freeform {
                reference_answer: self.reference_answer.ok_or_else(|| {
                    PortError::Validation(
                        "a freeform question must define reference_answer".to_string(),
                    )
                })?,
            },
        };
        let source = match self.source {
            SourceRecord::Llm => QuestionSource::Llm,
            SourceRecord::Manual => QuestionSource::Manual,
        };

        let mut question = Question::new(self.id, self.topic, self.text, kind, source)?;
        question.active = self.active;
        question.stats = QuestionStats::new(self.stats.times_shown, self.stats.times_correct)?;
        Ok(question)
    }

    fn from_domain(question: &Question) -> Self {
        let (question_type, options, correct_option_index, reference_answer) =
            match question.kind() {
                QuestionKind::Mcq {
                    options,
                    correct_index,
                } => (
                    QuestionTypeRecord::Mcq,
                    options.clone(),
                    Some(*correct_index),
                    None,
                ),
                QuestionKind::Freeform { reference_answer } => (
                    QuestionTypeRecord::Freeform,
                    Vec::new(),
                    None,
                    Some(reference_answer.clone()),
                ),
            };

        Self {
            id: question.id.clone(),
            topic: question.topic.clone(),
            text: question.text.clone(),
            question_type,
            source: match question.source {
                QuestionSource::Llm => SourceRecord::Llm,
                QuestionSource::Manual => SourceRecord::Manual,
            },
            active: question.active,
            options,
            correct_option_index,
            reference_answer,
            stats: StatsRecord {
                times_shown: question.stats.times_shown,
                times_correct: question.stats.times_correct,
            },
        }
    }
}

//=========================================================================================
// `QuestionRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl QuestionRepository for JsonFileRepository {
    async fn load(&self) -> PortResult<Vec<Question>> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Questions file {} does not exist yet.", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.error("read", e)),
        };

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let records: Vec<QuestionRecord> =
            serde_json::from_str(&text).map_err(|e| self.error("parse", e))?;

        let mut seen = HashSet::with_capacity(records.len());
        let mut questions = Vec::with_capacity(records.len());
        for (position, record) in records.into_iter().enumerate() {
            let question = record
                .to_domain()
                .map_err(|e| self.error("load", format!("entry {}: {}", position + 1, e)))?;
            if !seen.insert(question.id.clone()) {
                return Err(self.error(
                    "load",
                    format!("entry {}: duplicate id {}", position + 1, question.id),
                ));
            }
            questions.push(question);
        }
        Ok(questions)
    }

    async fn save(&self, questions: &[Question]) -> PortResult<()> {
        let records: Vec<QuestionRecord> = questions.iter().map(QuestionRecord::from_domain).collect();
        let json = serde_json::to_string_pretty(&records).map_err(|e| self.error("encode", e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.error("create the directory for", e))?;
        }

        // Write the new contents beside the target, then swap them in.
        let temp_path = self.temp_path();
        let write_result = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(json.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &self.path).await
        }
        .await;

        if let Err(e) = write_result {
            let _ = fs::remove_file(&temp_path).await;
            return Err(self.error("write", e));
        }

        info!("Saved {} questions to {}", questions.len(), self.path.display());
        Ok(())
    }
}

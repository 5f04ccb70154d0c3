//! services/cli/src/session.rs
//!
//! Opens the question collection for a shell session, recovering from an
//! unreadable questions file.

use crate::adapters::JsonFileRepository;
use crate::error::CliError;
use std::path::PathBuf;
use std::sync::Arc;
use study_companion_core::{
    ports::{PortError, StudyAssistantService},
    quiz::QuizManager,
};
use tracing::error;

/// Loads the collection. If the file cannot be read it is moved aside and the
/// session starts empty; the second value says where the file went.
pub async fn open_quiz(
    repository: Arc<JsonFileRepository>,
    assistant: Arc<dyn StudyAssistantService>,
) -> Result<(QuizManager, Option<PathBuf>), CliError> {
    match QuizManager::open(repository.clone(), assistant.clone()).await {
        Ok(quiz) => Ok((quiz, None)),
        Err(PortError::Persistence(reason)) => {
            error!(
                "Could not load questions from {}: {}",
                repository.path().display(),
                reason
            );
            let moved_to = repository.quarantine().await?;
            let quiz = QuizManager::from_questions(repository, assistant, Vec::new());
            Ok((quiz, moved_to))
        }
        Err(e) => Err(e.into()),
    }
}

//! crates/study_companion_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the study companion's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the storage format and of the language model provider.

use crate::domain::{Evaluation, GeneratedQuestionSpec, Question};
use async_trait::async_trait;
use std::time::Duration;

//=========================================================================================
// Port Error and Result Types
//=========================================================================================

/// A failure talking to the language model, after any retries were spent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    #[error("No language model is configured")]
    NotConfigured,

    #[error("Language model request failed{}: {message}", http_suffix(.status))]
    RequestFailed { status: Option<u16>, message: String },

    #[error("Language model rate limit hit, try again shortly")]
    RateLimited,

    #[error("Language model did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Language model service is unavailable: {0}")]
    Unavailable(String),

    #[error("Language model returned an unusable response: {0}")]
    InvalidResponse(String),
}

fn http_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" (HTTP {})", code))
        .unwrap_or_default()
}

impl LlmError {
    /// Whether another attempt may succeed: rate limits, server errors,
    /// unreachable service, timeouts and malformed responses.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RateLimited
            | LlmError::Timeout(_)
            | LlmError::Unavailable(_)
            | LlmError::InvalidResponse(_) => true,
            LlmError::RequestFailed {
                status: Some(status),
                ..
            } => *status == 429 || (500..600).contains(status),
            LlmError::RequestFailed { status: None, .. } | LlmError::NotConfigured => false,
        }
    }
}

/// The error type for all port and core operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Invalid question: {0}")]
    Validation(String),

    #[error("Could not access the question store: {0}")]
    Persistence(String),

    #[error("No question matches '{0}'")]
    NotFound(String),

    #[error("'{prefix}' matches {matches} questions, type more characters")]
    AmbiguousId { prefix: String, matches: usize },

    #[error("There are no active questions, add or enable some first")]
    NoActiveQuestions,

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Whole-collection storage: every mutation cycle is a full load, an in-memory
/// change and a full save.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Reads every stored question. A store that does not exist yet is empty.
    async fn load(&self) -> PortResult<Vec<Question>>;

    /// Replaces the stored collection with `questions`.
    async fn save(&self, questions: &[Question]) -> PortResult<()>;
}

/// Question generation and freeform grading, backed by a language model or by
/// local heuristics.
#[async_trait]
pub trait StudyAssistantService: Send + Sync {
    /// Produces candidate questions about `topic`, mixing multiple-choice and freeform.
    async fn generate_questions(
        &self,
        topic: &str,
        count: usize,
    ) -> PortResult<Vec<GeneratedQuestionSpec>>;

    /// Grades a freeform answer against the reference answer.
    async fn evaluate_freeform(
        &self,
        question_text: &str,
        reference_answer: &str,
        user_answer: &str,
    ) -> PortResult<Evaluation>;

    /// True when requests go to a live language model.
    fn is_live(&self) -> bool;
}

/// Input checks shared by every `StudyAssistantService` implementation.
pub fn check_generation_request(topic: &str, count: usize) -> PortResult<()> {
    if topic.trim().is_empty() {
        return Err(PortError::InvalidInput("Topic must not be empty.".to_string()));
    }
    if count == 0 {
        return Err(PortError::InvalidInput(
            "Number of questions must be positive.".to_string(),
        ));
    }
    Ok(())
}

/// Input checks shared by every `StudyAssistantService` implementation.
pub fn check_evaluation_request(question_text: &str, reference_answer: &str) -> PortResult<()> {
    if question_text.trim().is_empty() || reference_answer.trim().is_empty() {
        return Err(PortError::InvalidInput(
            "Question text and reference answer must not be empty.".to_string(),
        ));
    }
    Ok(())
}

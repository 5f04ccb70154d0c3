pub mod domain;
pub mod ports;
pub mod quiz;

pub use domain::{
    Answer, Evaluation, GeneratedQuestionSpec, Question, QuestionKind, QuestionSource,
    QuestionStats, TestOutcome,
};
pub use ports::{
    LlmError, PortError, PortResult, QuestionRepository, StudyAssistantService,
};
pub use quiz::{selection_weight, QuizManager, MIN_PRACTICE_WEIGHT};

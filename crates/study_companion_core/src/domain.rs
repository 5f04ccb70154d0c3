//! crates/study_companion_core/src/domain.rs
//!
//! Defines the pure, core data structures for the study companion.
//! These structs are independent of any storage or serialization format.

use crate::ports::{PortError, PortResult};
use std::iter::Sum;
use std::ops::Add;
use uuid::Uuid;

//=========================================================================================
// Question Metadata
//=========================================================================================

/// Where a question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionSource {
    /// Generated by the language model (or its offline fallback) and accepted by the user.
    Llm,
    /// Typed in by hand.
    Manual,
}

/// The answer format of a question together with the data needed to grade it.
///
/// The variant is fixed when the question is created; `Question` exposes no way
/// to swap it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    /// Multiple choice: an ordered list of options and the index of the correct one.
    Mcq {
        options: Vec<String>,
        correct_index: usize,
    },
    /// Open text, graded against a reference answer.
    Freeform { reference_answer: String },
}

impl QuestionKind {
    /// Checks the per-variant invariants.
    pub fn validate(&self) -> PortResult<()> {
        match self {
            QuestionKind::Mcq {
                options,
                correct_index,
            } => {
                if options.len() < 2 {
                    return Err(PortError::Validation(
                        "a multiple-choice question needs at least two options".to_string(),
                    ));
                }
                if options.iter().any(|option| option.trim().is_empty()) {
                    return Err(PortError::Validation(
                        "multiple-choice options must not be blank".to_string(),
                    ));
                }
                if *correct_index >= options.len() {
                    return Err(PortError::Validation(format!(
                        "correct option {} is out of range for {} options",
                        correct_index + 1,
                        options.len()
                    )));
                }
                Ok(())
            }
            QuestionKind::Freeform { reference_answer } => {
                if reference_answer.trim().is_empty() {
                    return Err(PortError::Validation(
                        "a freeform question needs a reference answer".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Short lowercase label used in listings and on disk.
    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::Mcq { .. } => "mcq",
            QuestionKind::Freeform { .. } => "freeform",
        }
    }

    pub fn is_mcq(&self) -> bool {
        matches!(self, QuestionKind::Mcq { .. })
    }
}

//=========================================================================================
// Statistics
//=========================================================================================

/// Per-question answer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuestionStats {
    pub times_shown: u32,
    pub times_correct: u32,
}

impl QuestionStats {
    /// Builds stats from stored counters, rejecting more correct answers than attempts.
    pub fn new(times_shown: u32, times_correct: u32) -> PortResult<Self> {
        if times_correct > times_shown {
            return Err(PortError::Validation(format!(
                "times_correct ({}) exceeds times_shown ({})",
                times_correct, times_shown
            )));
        }
        Ok(Self {
            times_shown,
            times_correct,
        })
    }

    /// Records one answered attempt.
    pub fn record(&mut self, correct: bool) {
        self.times_shown += 1;
        if correct {
            self.times_correct += 1;
        }
    }

    /// Ratio of correct answers, or `None` if the question was never shown.
    pub fn accuracy(&self) -> Option<f64> {
        if self.times_shown == 0 {
            return None;
        }
        Some(f64::from(self.times_correct) / f64::from(self.times_shown))
    }
}

impl Add for QuestionStats {
    type Output = QuestionStats;

    fn add(self, other: QuestionStats) -> QuestionStats {
        QuestionStats {
            times_shown: self.times_shown + other.times_shown,
            times_correct: self.times_correct + other.times_correct,
        }
    }
}

impl Sum for QuestionStats {
    fn sum<I: Iterator<Item = QuestionStats>>(iter: I) -> Self {
        iter.fold(QuestionStats::default(), Add::add)
    }
}

//=========================================================================================
// Question
//=========================================================================================

/// A single stored study item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: String,
    pub topic: String,
    pub text: String,
    kind: QuestionKind,
    pub source: QuestionSource,
    pub active: bool,
    pub stats: QuestionStats,
}

impl Question {
    /// Creates a new, active, never-shown question after validating it.
    pub fn new(
        id: String,
        topic: String,
        text: String,
        kind: QuestionKind,
        source: QuestionSource,
    ) -> PortResult<Self> {
        if id.trim().is_empty() {
            return Err(PortError::Validation("question id must not be empty".to_string()));
        }
        if topic.trim().is_empty() {
            return Err(PortError::Validation("topic must not be empty".to_string()));
        }
        if text.trim().is_empty() {
            return Err(PortError::Validation(
                "question text must not be empty".to_string(),
            ));
        }
        kind.validate()?;

        Ok(Self {
            id,
            topic,
            text,
            kind,
            source,
            active: true,
            stats: QuestionStats::default(),
        })
    }

    /// Turns an accepted generated spec into a question with a fresh id.
    pub fn from_generated(
        topic: &str,
        spec: GeneratedQuestionSpec,
        source: QuestionSource,
    ) -> PortResult<Self> {
        Self::new(
            Self::new_id(),
            topic.trim().to_string(),
            spec.text,
            spec.kind,
            source,
        )
    }

    /// A new opaque identifier: 32 lowercase hex characters.
    pub fn new_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    pub fn kind(&self) -> &QuestionKind {
        &self.kind
    }

    pub fn is_mcq(&self) -> bool {
        self.kind.is_mcq()
    }

    /// Records one answered attempt on the embedded stats.
    pub fn record_result(&mut self, correct: bool) {
        self.stats.record(correct);
    }

    /// The first eight characters of the id, as shown in listings.
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map(|(index, _)| index)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

//=========================================================================================
// Transient DTOs
//=========================================================================================

/// A candidate question produced by a `StudyAssistantService`, pending user review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuestionSpec {
    pub text: String,
    pub kind: QuestionKind,
}

impl GeneratedQuestionSpec {
    pub fn mcq(text: impl Into<String>, options: Vec<String>, correct_index: usize) -> Self {
        Self {
            text: text.into(),
            kind: QuestionKind::Mcq {
                options,
                correct_index,
            },
        }
    }

    pub fn freeform(text: impl Into<String>, reference_answer: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: QuestionKind::Freeform {
                reference_answer: reference_answer.into(),
            },
        }
    }

    /// Applies the same rules a stored question must satisfy.
    pub fn validate(&self) -> PortResult<()> {
        if self.text.trim().is_empty() {
            return Err(PortError::Validation(
                "question text must not be empty".to_string(),
            ));
        }
        self.kind.validate()
    }
}

/// The verdict on one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub correct: bool,
    pub explanation: String,
}

/// What the user typed in response to a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// A zero-based option index for multiple-choice questions.
    Choice(usize),
    /// Free text for freeform questions.
    Text(String),
}

/// The score of one completed test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestOutcome {
    pub total: usize,
    pub correct: usize,
}

impl TestOutcome {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.correct as f64 / self.total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq(options: &[&str], correct_index: usize) -> QuestionKind {
        QuestionKind::Mcq {
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_index,
        }
    }

    #[test]
    fn stats_track_accuracy() {
        let mut stats = QuestionStats::default();
        assert_eq!(stats.accuracy(), None);

        stats.record(true);
        assert_eq!(stats.times_shown, 1);
        assert_eq!(stats.times_correct, 1);
        assert_eq!(stats.accuracy(), Some(1.0));

        stats.record(false);
        assert_eq!(stats.times_shown, 2);
        assert_eq!(stats.times_correct, 1);
        assert_eq!(stats.accuracy(), Some(0.5));
    }

    #[test]
    fn stats_reject_more_correct_than_shown() {
        assert!(matches!(
            QuestionStats::new(1, 2),
            Err(PortError::Validation(_))
        ));
        assert!(QuestionStats::new(2, 2).is_ok());
    }

    #[test]
    fn stats_add_up() {
        let total: QuestionStats = [
            QuestionStats::new(3, 1).unwrap(),
            QuestionStats::new(2, 2).unwrap(),
            QuestionStats::default(),
        ]
        .into_iter()
        .sum();
        assert_eq!(total, QuestionStats::new(5, 3).unwrap());
    }

    #[test]
    fn mcq_needs_two_options_and_an_index_in_range() {
        assert!(mcq(&["1", "2"], 1).validate().is_ok());
        assert!(matches!(
            mcq(&["only"], 0).validate(),
            Err(PortError::Validation(_))
        ));
        assert!(matches!(
            mcq(&["a", "b"], 2).validate(),
            Err(PortError::Validation(_))
        ));
        assert!(matches!(
            mcq(&["a", "  "], 0).validate(),
            Err(PortError::Validation(_))
        ));
    }

    #[test]
    fn freeform_needs_a_reference_answer() {
        let blank = QuestionKind::Freeform {
            reference_answer: "   ".to_string(),
        };
        assert!(matches!(blank.validate(), Err(PortError::Validation(_))));

        let question = Question::new(
            "q3".to_string(),
            "Rust".to_string(),
            "What does the borrow checker enforce?".to_string(),
            QuestionKind::Freeform {
                reference_answer: "Aliasing xor mutability.".to_string(),
            },
            QuestionSource::Manual,
        )
        .unwrap();
        assert!(!question.is_mcq());
        assert!(question.active);
        assert_eq!(question.stats, QuestionStats::default());
    }

    #[test]
    fn question_rejects_blank_text() {
        let result = Question::new(
            "q1".to_string(),
            "Rust".to_string(),
            " ".to_string(),
            mcq(&["a", "b"], 0),
            QuestionSource::Manual,
        );
        assert!(matches!(result, Err(PortError::Validation(_))));
    }

    #[test]
    fn generated_spec_becomes_question_with_fresh_id() {
        let spec = GeneratedQuestionSpec::mcq("Pick one", vec!["x".into(), "y".into()], 1);
        let question = Question::from_generated(" Traits ", spec, QuestionSource::Llm).unwrap();

        assert_eq!(question.id.len(), 32);
        assert!(question.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(question.topic, "Traits");
        assert_eq!(question.source, QuestionSource::Llm);
        assert_eq!(question.short_id(), &question.id[..8]);
    }

    #[test]
    fn test_outcome_percentage() {
        assert_eq!(TestOutcome { total: 4, correct: 3 }.percentage(), 75.0);
        assert_eq!(TestOutcome { total: 0, correct: 0 }.percentage(), 0.0);
    }
}

//! services/cli/src/adapters/offline_llm.rs
//!
//! An assistant that works without a language model. Generation produces
//! templated questions; grading compares keywords with the reference answer.

use async_trait::async_trait;
use std::collections::BTreeSet;
use study_companion_core::domain::{Evaluation, GeneratedQuestionSpec};
use study_companion_core::ports::{
    check_evaluation_request, check_generation_request, PortResult, StudyAssistantService,
};

/// Share of reference keywords an answer must contain to count as correct.
pub const KEYWORD_MATCH_THRESHOLD: f64 = 0.4;

/// Keywords shorter than this are ignored ("the", "and", "is", ...).
const MIN_KEYWORD_LEN: usize = 4;

//=========================================================================================
// Heuristics
//=========================================================================================

/// One generic multiple-choice question plus `max(count - 1, 1)` freeform ones.
pub fn fallback_questions(topic: &str, count: usize) -> Vec<GeneratedQuestionSpec> {
    let topic = topic.trim();
    let mut specs = Vec::with_capacity(count.max(2));

    specs.push(GeneratedQuestionSpec::mcq(
        format!("Which statement best describes '{}'?", topic),
        vec![
            format!("It is a core concept related to {}.", topic),
            "It is an unrelated historical event.".to_string(),
            "It is a type of kitchen appliance.".to_string(),
            "It is a fictional character.".to_string(),
        ],
        0,
    ));

    for variation in 1..=count.saturating_sub(1).max(1) {
        specs.push(GeneratedQuestionSpec::freeform(
            format!(
                "In your own words, explain what '{}' means (variation {}).",
                topic, variation
            ),
            format!("A clear, concise explanation of {}.", topic),
        ));
    }

    specs
}

/// Grades `answer` by how many of the reference keywords it mentions.
pub fn overlap_evaluation(reference: &str, answer: &str) -> Evaluation {
    if normalize(reference) == normalize(answer) {
        return Evaluation {
            correct: true,
            explanation: "Your answer matches the reference answer.".to_string(),
        };
    }

    let expected = keywords(reference);
    if expected.is_empty() {
        return Evaluation {
            correct: false,
            explanation: "The reference answer has no keywords to compare against.".to_string(),
        };
    }

    let given = keywords(answer);
    let matched: Vec<&str> = expected
        .intersection(&given)
        .map(String::as_str)
        .collect();
    let ratio = matched.len() as f64 / expected.len() as f64;
    let correct = ratio >= KEYWORD_MATCH_THRESHOLD;

    let matched_list = if matched.is_empty() {
        "none".to_string()
    } else {
        matched.join(", ")
    };
    let explanation = format!(
        "Offline check: {:.0}% of the key terms matched ({}). {}",
        ratio * 100.0,
        matched_list,
        if correct {
            "That is enough to count as correct."
        } else {
            "Compare your answer with the reference and try again."
        }
    );

    Evaluation { correct, explanation }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= MIN_KEYWORD_LEN)
        .map(str::to_lowercase)
        .collect()
}

//=========================================================================================
// The Adapter
//=========================================================================================

/// `StudyAssistantService` backed only by the heuristics above.
#[derive(Clone, Debug, Default)]
pub struct OfflineStudyAdapter;

impl OfflineStudyAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StudyAssistantService for OfflineStudyAdapter {
    async fn generate_questions(
        &self,
        topic: &str,
        count: usize,
    ) -> PortResult<Vec<GeneratedQuestionSpec>> {
        check_generation_request(topic, count)?;
        Ok(fallback_questions(topic, count))
    }

    async fn evaluate_freeform(
        &self,
        question_text: &str,
        reference_answer: &str,
        user_answer: &str,
    ) -> PortResult<Evaluation> {
        check_evaluation_request(question_text, reference_answer)?;
        Ok(overlap_evaluation(reference_answer, user_answer))
    }

    fn is_live(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_companion_core::ports::PortError;

    #[tokio::test]
    async fn generation_mixes_question_types() {
        let specs = OfflineStudyAdapter::new()
            .generate_questions("  photosynthesis ", 4)
            .await
            .unwrap();

        assert_eq!(specs.len(), 4);
        assert_eq!(specs.iter().filter(|s| s.kind.is_mcq()).count(), 1);
        assert!(specs.iter().all(|s| s.validate().is_ok()));
        assert!(specs[1].text.contains("'photosynthesis'"));
    }

    #[test]
    fn a_single_requested_question_still_yields_both_types() {
        let specs = fallback_questions("rust", 1);
        assert_eq!(specs.len(), 2);
        assert!(specs[0].kind.is_mcq());
        assert!(!specs[1].kind.is_mcq());
    }

    #[tokio::test]
    async fn blank_topic_and_zero_count_are_rejected() {
        let adapter = OfflineStudyAdapter::new();
        assert!(matches!(
            adapter.generate_questions(" ", 3).await,
            Err(PortError::InvalidInput(_))
        ));
        assert!(matches!(
            adapter.generate_questions("rust", 0).await,
            Err(PortError::InvalidInput(_))
        ));
    }

    #[test]
    fn identical_answers_ignore_case_and_spacing() {
        let evaluation = overlap_evaluation("The Mitochondria", "  the   mitochondria ");
        assert!(evaluation.correct);
    }

    #[test]
    fn enough_shared_keywords_count_as_correct() {
        let reference = "Plants convert sunlight into chemical energy stored in glucose.";
        let evaluation = overlap_evaluation(reference, "plants turn sunlight into energy");
        assert!(evaluation.correct, "{}", evaluation.explanation);
        assert!(evaluation.explanation.contains("sunlight"));

        let evaluation = overlap_evaluation(reference, "no idea at all");
        assert!(!evaluation.correct);
        assert!(evaluation.explanation.contains("none"));
    }

    #[tokio::test]
    async fn evaluation_requires_question_and_reference() {
        let adapter = OfflineStudyAdapter::new();
        let result = adapter.evaluate_freeform("What?", "  ", "anything").await;
        assert!(matches!(result, Err(PortError::InvalidInput(_))));
        assert!(!adapter.is_live());
    }
}

//! crates/study_companion_core/src/quiz.rs
//!
//! The quiz manager: owns the loaded question collection for a session, picks
//! questions for practice and test runs, grades answers and keeps the stored
//! statistics current.

use crate::domain::{
    Answer, Evaluation, GeneratedQuestionSpec, Question, QuestionKind, QuestionSource,
    QuestionStats,
};
use crate::ports::{PortError, PortResult, QuestionRepository, StudyAssistantService};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{info, warn};

/// Lowest practice weight, so well-known questions still come back now and then.
pub const MIN_PRACTICE_WEIGHT: f64 = 0.1;

/// Practice-mode weight for a question with the given stats.
///
/// Never-shown questions get the full weight of `1.0`; otherwise the weight is
/// the error rate, floored at [`MIN_PRACTICE_WEIGHT`].
pub fn selection_weight(stats: &QuestionStats) -> f64 {
    match stats.accuracy() {
        None => 1.0,
        Some(accuracy) => (1.0 - accuracy).max(MIN_PRACTICE_WEIGHT),
    }
}

//=========================================================================================
// The Quiz Manager
//=========================================================================================

pub struct QuizManager {
    repository: Arc<dyn QuestionRepository>,
    assistant: Arc<dyn StudyAssistantService>,
    questions: Vec<Question>,
    rng: StdRng,
}

impl QuizManager {
    /// Loads the collection from `repository` and starts a session over it.
    pub async fn open(
        repository: Arc<dyn QuestionRepository>,
        assistant: Arc<dyn StudyAssistantService>,
    ) -> PortResult<Self> {
        let questions = repository.load().await?;
        info!("Loaded {} questions.", questions.len());
        Ok(Self::from_questions(repository, assistant, questions))
    }

    /// Starts a session over an already loaded collection.
    pub fn from_questions(
        repository: Arc<dyn QuestionRepository>,
        assistant: Arc<dyn StudyAssistantService>,
        questions: Vec<Question>,
    ) -> Self {
        Self {
            repository,
            assistant,
            questions,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replaces the random source, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn assistant(&self) -> &Arc<dyn StudyAssistantService> {
        &self.assistant
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn active_questions(&self) -> Vec<&Question> {
        self.questions.iter().filter(|q| q.active).collect()
    }

    pub fn find(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Totals over every stored question.
    pub fn summary(&self) -> QuestionStats {
        self.questions.iter().map(|q| q.stats).sum()
    }

    // --- Adding questions ---

    /// Adds a question and saves the collection.
    pub async fn add_question(&mut self, question: Question) -> PortResult<()> {
        if self.find(&question.id).is_some() {
            return Err(PortError::Validation(format!(
                "a question with id {} already exists",
                question.id
            )));
        }

        self.questions.push(question);
        if let Err(e) = self.persist().await {
            self.questions.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Turns an accepted generated spec into a stored question.
    pub async fn add_generated(
        &mut self,
        topic: &str,
        spec: GeneratedQuestionSpec,
    ) -> PortResult<Question> {
        spec.validate()?;
        let question = Question::from_generated(topic, spec, QuestionSource::Llm)?;
        self.add_question(question.clone()).await?;
        info!("Saved generated question {}.", question.short_id());
        Ok(question)
    }

    // --- Selection ---

    /// Draws one active question, favouring those answered wrongly most often.
    pub fn select_for_practice(&mut self) -> PortResult<Question> {
        let active: Vec<&Question> = self.questions.iter().filter(|q| q.active).collect();
        if active.is_empty() {
            return Err(PortError::NoActiveQuestions);
        }

        let weights = active.iter().map(|q| selection_weight(&q.stats));
        let distribution =
            WeightedIndex::new(weights).map_err(|e| PortError::Unexpected(e.to_string()))?;
        let chosen = active[distribution.sample(&mut self.rng)].clone();

        info!("Selected question {} for practice.", chosen.short_id());
        Ok(chosen)
    }

    /// Draws `count` distinct active questions uniformly at random.
    ///
    /// Asking for more questions than are active caps the test at the active count.
    pub fn select_for_test(&mut self, count: usize) -> PortResult<Vec<Question>> {
        if count == 0 {
            return Err(PortError::InvalidInput(
                "Number of questions must be positive.".to_string(),
            ));
        }

        let active: Vec<&Question> = self.questions.iter().filter(|q| q.active).collect();
        if active.is_empty() {
            return Err(PortError::NoActiveQuestions);
        }

        let take = if count > active.len() {
            warn!(
                "Requested {} test questions but only {} are active; capping.",
                count,
                active.len()
            );
            active.len()
        } else {
            count
        };

        Ok(active
            .choose_multiple(&mut self.rng, take)
            .map(|q| (*q).clone())
            .collect())
    }

    // --- Grading and statistics ---

    /// Grades an answer. Multiple-choice is checked locally; freeform goes to
    /// the study assistant.
    pub async fn check_answer(&self, question: &Question, answer: Answer) -> PortResult<Evaluation> {
        match (question.kind(), answer) {
            (
                QuestionKind::Mcq {
                    options,
                    correct_index,
                },
                Answer::Choice(choice),
            ) => {
                if choice >= options.len() {
                    return Err(PortError::InvalidInput(format!(
                        "Choose an option between 1 and {}.",
                        options.len()
                    )));
                }
                let correct = choice == *correct_index;
                let explanation = if correct {
                    "Correct!".to_string()
                } else {
                    format!("Incorrect. Correct answer: {}", options[*correct_index])
                };
                Ok(Evaluation {
                    correct,
                    explanation,
                })
            }
            (QuestionKind::Freeform { reference_answer }, Answer::Text(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(Evaluation {
                        correct: false,
                        explanation: "You entered an empty answer; counting as incorrect."
                            .to_string(),
                    });
                }
                self.assistant
                    .evaluate_freeform(&question.text, reference_answer, text)
                    .await
            }
            (QuestionKind::Mcq { .. }, Answer::Text(_)) => Err(
                PortError::InvalidInput("Answer with the number of an option.".to_string()),
            ),
            (QuestionKind::Freeform { .. }, Answer::Choice(_)) => Err(
                PortError::InvalidInput("This question expects a written answer.".to_string()),
            ),
        }
    }

    /// Records one answered attempt and saves immediately.
    pub async fn record_result(&mut self, id: &str, correct: bool) -> PortResult<QuestionStats> {
        let index = self.index_of(id)?;
        let previous = self.questions[index].stats;
        self.questions[index].record_result(correct);

        if let Err(e) = self.persist().await {
            self.questions[index].stats = previous;
            return Err(e);
        }
        Ok(self.questions[index].stats)
    }

    // --- Activation ---

    /// Enables or disables the question with exactly this id.
    pub async fn set_question_active(&mut self, id: &str, active: bool) -> PortResult<()> {
        let index = self.index_of(id)?;
        let previous = self.questions[index].active;
        self.questions[index].active = active;

        if let Err(e) = self.persist().await {
            self.questions[index].active = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Flips the active flag of the question whose id is, or starts with, `id_or_prefix`.
    pub async fn toggle_question_active(&mut self, id_or_prefix: &str) -> PortResult<Question> {
        let index = self.resolve_prefix(id_or_prefix)?;
        self.questions[index].active = !self.questions[index].active;

        if let Err(e) = self.persist().await {
            self.questions[index].active = !self.questions[index].active;
            return Err(e);
        }

        let question = &self.questions[index];
        info!(
            "Question {} is now {}.",
            question.short_id(),
            if question.active { "active" } else { "inactive" }
        );
        Ok(question.clone())
    }

    /// Index of the single question an id prefix refers to. An exact id always wins.
    fn resolve_prefix(&self, id_or_prefix: &str) -> PortResult<usize> {
        let prefix = id_or_prefix.trim();
        if prefix.is_empty() {
            return Err(PortError::InvalidInput(
                "Enter at least one character of a question id.".to_string(),
            ));
        }

        if let Some(index) = self.questions.iter().position(|q| q.id == prefix) {
            return Ok(index);
        }

        let matches: Vec<usize> = self
            .questions
            .iter()
            .enumerate()
            .filter(|(_, q)| q.id.starts_with(prefix))
            .map(|(index, _)| index)
            .collect();

        match matches.as_slice() {
            [] => Err(PortError::NotFound(prefix.to_string())),
            [index] => Ok(*index),
            _ => Err(PortError::AmbiguousId {
                prefix: prefix.to_string(),
                matches: matches.len(),
            }),
        }
    }

    fn index_of(&self, id: &str) -> PortResult<usize> {
        self.questions
            .iter()
            .position(|q| q.id == id)
            .ok_or_else(|| PortError::NotFound(id.to_string()))
    }

    async fn persist(&self) -> PortResult<()> {
        self.repository.save(&self.questions).await
    }
}

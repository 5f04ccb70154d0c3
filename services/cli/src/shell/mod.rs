//! services/cli/src/shell/mod.rs
//!
//! The interactive menu. Each menu item lives in its own module; this module
//! owns the loop, the error reporting and the question-asking flow shared by
//! practice and test mode.

pub mod console;
mod generate;
mod manage;
mod practice;
mod stats;
mod test_mode;

pub use console::Console;

use crate::config::Environment;
use crate::error::CliError;
use crate::results_log::ResultsLog;
use std::io::{BufRead, Write};
use study_companion_core::{
    domain::{Answer, Question, QuestionKind},
    ports::PortError,
    quiz::QuizManager,
};
use tracing::{info, warn};

pub struct Shell<R, W> {
    console: Console<R, W>,
    quiz: QuizManager,
    results: ResultsLog,
    environment: Environment,
}

impl<R: BufRead, W: Write> Shell<R, W> {
    pub fn new(
        console: Console<R, W>,
        quiz: QuizManager,
        results: ResultsLog,
        environment: Environment,
    ) -> Self {
        Self {
            console,
            quiz,
            results,
            environment,
        }
    }

    pub fn console(&self) -> &Console<R, W> {
        &self.console
    }

    pub fn quiz(&self) -> &QuizManager {
        &self.quiz
    }

    /// Runs the menu until the user exits or the input closes. Failures of a
    /// single action are reported and the menu continues; terminal IO errors end it.
    pub async fn run(&mut self) -> Result<(), CliError> {
        self.greet()?;

        loop {
            self.print_menu()?;
            let Some(choice) = self.console.prompt("Select an option: ")? else {
                break;
            };

            let outcome = match choice.as_str() {
                "1" => generate::run(&mut self.console, &mut self.quiz).await,
                "2" => practice::run(&mut self.console, &mut self.quiz).await,
                "3" => test_mode::run(&mut self.console, &mut self.quiz, &self.results).await,
                "4" => stats::run(&mut self.console, &self.quiz),
                "5" => manage::run(&mut self.console, &mut self.quiz).await,
                "0" => break,
                _ => {
                    self.console.say("Please choose a valid option (0-5).")?;
                    continue;
                }
            };

            match outcome {
                Ok(()) => {}
                Err(CliError::Port(e)) => {
                    warn!("Menu action {} failed: {}", choice, e);
                    self.console.say(format!("Error: {}", e))?;
                }
                Err(e) => return Err(e),
            }
        }

        self.console.say("Goodbye!")?;
        info!("Session ended.");
        Ok(())
    }

    fn greet(&mut self) -> Result<(), CliError> {
        self.console.say("Welcome to the Study Companion!")?;
        self.console
            .say(format!("Environment: {}", self.environment.as_str()))?;
        if !self.quiz.assistant().is_live() {
            self.console.say(
                "Note: No language model configured, using simple built-in evaluation and generation.",
            )?;
        }
        Ok(())
    }

    fn print_menu(&mut self) -> Result<(), CliError> {
        let console = &mut self.console;
        console.blank()?;
        console.say("Main menu")?;
        console.say("---------")?;
        console.say("1. Generate questions")?;
        console.say("2. Practice mode")?;
        console.say("3. Test mode")?;
        console.say("4. View question statistics")?;
        console.say("5. Manage questions (enable/disable)")?;
        console.say("0. Exit")?;
        console.blank()?;
        Ok(())
    }
}

/// Shows a question, reads an answer and prints the verdict.
///
/// Returns `None` when the input closes before an answer is given. A grading
/// failure from the language model counts as an incorrect answer.
async fn ask_question<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    quiz: &QuizManager,
    question: &Question,
) -> Result<Option<bool>, CliError> {
    console.blank()?;
    console.say(format!("Topic: {}", question.topic))?;
    console.say(&question.text)?;

    let answer = match question.kind() {
        QuestionKind::Mcq { options, .. } => {
            for (number, option) in options.iter().enumerate() {
                console.say(format!("  {}. {}", number + 1, option))?;
            }
            loop {
                let Some(raw) = console.prompt("Your answer (number): ")? else {
                    return Ok(None);
                };
                match raw.parse::<usize>() {
                    Ok(number) if (1..=options.len()).contains(&number) => {
                        break Answer::Choice(number - 1)
                    }
                    Ok(_) => console.say("Number out of range, try again.")?,
                    Err(_) => console.say("Please enter a valid number.")?,
                }
            }
        }
        QuestionKind::Freeform { .. } => {
            let Some(raw) = console.prompt("Your answer: ")? else {
                return Ok(None);
            };
            Answer::Text(raw)
        }
    };

    match quiz.check_answer(question, answer).await {
        Ok(evaluation) if question.is_mcq() => {
            console.say(&evaluation.explanation)?;
            Ok(Some(evaluation.correct))
        }
        Ok(evaluation) => {
            console.say("Evaluation:")?;
            console.say(&evaluation.explanation)?;
            console.say(format!(
                "Result: {}",
                if evaluation.correct { "Correct!" } else { "Incorrect." }
            ))?;
            Ok(Some(evaluation.correct))
        }
        Err(PortError::Llm(e)) => {
            console.say(format!("Could not evaluate answer automatically: {}", e))?;
            console.say("Assuming the answer is incorrect.")?;
            Ok(Some(false))
        }
        Err(e) => Err(e.into()),
    }
}

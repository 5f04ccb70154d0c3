//! services/cli/src/shell/generate.rs
//!
//! Asks the study assistant for new questions and lets the user accept, skip
//! or edit each one before it is stored.

use super::Console;
use crate::error::CliError;
use std::io::{BufRead, Write};
use study_companion_core::{
    domain::{GeneratedQuestionSpec, QuestionKind},
    quiz::QuizManager,
};

const DEFAULT_COUNT: usize = 3;

pub(super) async fn run<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    quiz: &mut QuizManager,
) -> Result<(), CliError> {
    let Some(topic) =
        console.prompt("Enter a topic for new questions (or leave blank to cancel): ")?
    else {
        return Ok(());
    };
    if topic.is_empty() {
        console.say("Cancelled.")?;
        return Ok(());
    }

    let Some(raw_count) = console.prompt("How many questions should I generate? [3]: ")? else {
        return Ok(());
    };
    let count = match raw_count.parse::<usize>() {
        _ if raw_count.is_empty() => DEFAULT_COUNT,
        Ok(count) if count > 0 => count,
        _ => {
            console.say("Invalid number, using 3 questions.")?;
            DEFAULT_COUNT
        }
    };

    let specs = match quiz.assistant().generate_questions(&topic, count).await {
        Ok(specs) => specs,
        Err(e) => {
            console.say(format!("Could not generate questions: {}", e))?;
            return Ok(());
        }
    };
    if specs.is_empty() {
        console.say("No questions were generated.")?;
        return Ok(());
    }

    let total = specs.len();
    for (index, mut spec) in specs.into_iter().enumerate() {
        console.blank()?;
        console.say(format!("Question {}/{}", index + 1, total))?;
        preview(console, &spec)?;

        loop {
            let Some(action) = console.prompt("[a]ccept, [s]kip, [e]dit, [q]uit: ")? else {
                return Ok(());
            };
            match action.to_lowercase().as_str() {
                "a" => {
                    let question = quiz.add_generated(&topic, spec).await?;
                    console.say(format!("Saved question with id: {}", question.id))?;
                    break;
                }
                "s" => break,
                "q" => return Ok(()),
                "e" => {
                    edit(console, &mut spec)?;
                    preview(console, &spec)?;
                }
                _ => console.say("Please choose 'a', 's', 'e', or 'q'.")?,
            }
        }
    }
    Ok(())
}

fn preview<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    spec: &GeneratedQuestionSpec,
) -> Result<(), CliError> {
    console.say(format!("Type: {}", spec.kind.label()))?;
    console.say("Text:")?;
    console.say(format!("  {}", spec.text))?;
    match &spec.kind {
        QuestionKind::Mcq {
            options,
            correct_index,
        } => {
            console.say("Options:")?;
            for (index, option) in options.iter().enumerate() {
                let marker = if index == *correct_index { "*" } else { " " };
                console.say(format!("  {}. {} {}", index + 1, option, marker))?;
            }
        }
        QuestionKind::Freeform { reference_answer } => {
            console.say(format!("Reference answer: {}", reference_answer))?;
        }
    }
    Ok(())
}

/// Blank input keeps the current value of a field.
fn edit<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    spec: &mut GeneratedQuestionSpec,
) -> Result<(), CliError> {
    console.say("Leave a field blank to keep the current value.")?;

    if let Some(text) = console.prompt("New question text: ")?.filter(|t| !t.is_empty()) {
        spec.text = text;
    }

    match &mut spec.kind {
        QuestionKind::Freeform { reference_answer } => {
            if let Some(reference) = console
                .prompt("New reference answer: ")?
                .filter(|r| !r.is_empty())
            {
                *reference_answer = reference;
            }
        }
        QuestionKind::Mcq {
            options,
            correct_index,
        } => {
            let Some(raw) = console.prompt("Number of the correct option: ")? else {
                return Ok(());
            };
            if raw.is_empty() {
                return Ok(());
            }
            match raw.parse::<usize>() {
                Ok(number) if (1..=options.len()).contains(&number) => {
                    *correct_index = number - 1;
                }
                _ => console.say("Not a valid option number; keeping the current answer.")?,
            }
        }
    }
    Ok(())
}

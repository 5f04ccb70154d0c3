//! services/cli/src/shell/manage.rs
//!
//! Enables and disables questions by id prefix.

use super::Console;
use crate::error::CliError;
use std::io::{BufRead, Write};
use study_companion_core::quiz::QuizManager;

pub(super) async fn run<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    quiz: &mut QuizManager,
) -> Result<(), CliError> {
    if quiz.questions().is_empty() {
        console.say("No questions stored yet.")?;
        return Ok(());
    }

    console.blank()?;
    console.say("Existing questions:")?;
    for question in quiz.questions() {
        console.say(format!(
            "  {} - {} - {}",
            question.short_id(),
            if question.active { "[active]" } else { "[inactive]" },
            question.topic
        ))?;
    }

    loop {
        let Some(prefix) =
            console.prompt("Enter question ID prefix to toggle (or blank to return): ")?
        else {
            break;
        };
        if prefix.is_empty() {
            break;
        }

        // A bad prefix only needs another try, not a trip back to the menu.
        match quiz.toggle_question_active(&prefix).await {
            Ok(question) => console.say(format!(
                "Question {} is now {}.",
                question.short_id(),
                if question.active { "active" } else { "inactive" }
            ))?,
            Err(e) => console.say(format!("Error: {}", e))?,
        }
    }
    Ok(())
}

//! services/cli/src/shell/practice.rs
//!
//! Open-ended practice: weighted draws until the user quits.

use super::{ask_question, Console};
use crate::error::CliError;
use std::io::{BufRead, Write};
use study_companion_core::quiz::QuizManager;

pub(super) async fn run<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    quiz: &mut QuizManager,
) -> Result<(), CliError> {
    if quiz.active_questions().is_empty() {
        console.say("There are no active questions to practice.")?;
        return Ok(());
    }

    console.say("Entering practice mode. Press Enter to continue, or 'q' to quit.")?;
    loop {
        match console.prompt("[Enter/q]: ")? {
            Some(choice) if !choice.eq_ignore_ascii_case("q") => {}
            _ => break,
        }

        let question = quiz.select_for_practice()?;
        let Some(correct) = ask_question(console, quiz, &question).await? else {
            break;
        };
        quiz.record_result(&question.id, correct).await?;
    }
    Ok(())
}

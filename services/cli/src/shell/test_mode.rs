//! services/cli/src/shell/test_mode.rs
//!
//! A fixed-size test over distinct questions. The score is appended to the
//! results log once every question has been answered.

use super::{ask_question, Console};
use crate::error::CliError;
use crate::results_log::ResultsLog;
use std::io::{BufRead, Write};
use study_companion_core::{domain::TestOutcome, quiz::QuizManager};
use tracing::{info, warn};

pub(super) async fn run<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    quiz: &mut QuizManager,
    results: &ResultsLog,
) -> Result<(), CliError> {
    let available = quiz.active_questions().len();
    if available == 0 {
        console.say("There are no active questions available for testing.")?;
        return Ok(());
    }

    console.say(format!("There are {} active questions.", available))?;
    let Some(raw) = console.prompt("How many questions do you want in the test? ")? else {
        return Ok(());
    };
    let Ok(requested) = raw.parse::<usize>() else {
        console.say("Invalid number; cancelling test.")?;
        return Ok(());
    };

    let selected = quiz.select_for_test(requested)?;
    if selected.len() < requested {
        console.say(format!(
            "Only {} questions are active; the test is shortened.",
            selected.len()
        ))?;
    }

    let mut outcome = TestOutcome {
        total: selected.len(),
        correct: 0,
    };
    for question in &selected {
        let Some(correct) = ask_question(console, quiz, question).await? else {
            console.say("Test abandoned; no score recorded.")?;
            return Ok(());
        };
        if correct {
            outcome.correct += 1;
        }
        quiz.record_result(&question.id, correct).await?;
    }

    console.blank()?;
    console.say(format!(
        "Your score: {} / {} ({:.0}%)",
        outcome.correct,
        outcome.total,
        outcome.percentage()
    ))?;
    info!(
        "Test completed: {}/{} correct.",
        outcome.correct, outcome.total
    );

    if let Err(e) = results.append(&outcome).await {
        warn!("Could not write {}: {}", results.path().display(), e);
        console.say(format!("Could not save the score to the results log: {}", e))?;
    }
    Ok(())
}

//! services/cli/src/shell/stats.rs

use super::Console;
use crate::error::CliError;
use std::io::{BufRead, Write};
use study_companion_core::{domain::QuestionStats, quiz::QuizManager};

pub(super) fn run<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    quiz: &QuizManager,
) -> Result<(), CliError> {
    let questions = quiz.questions();
    if questions.is_empty() {
        console.say("No questions stored yet.")?;
        return Ok(());
    }

    console.blank()?;
    console.say(format!(
        "{:8} {:3} {:8} {:20} {:>5} {:>7} {:>5}",
        "ID", "Act", "Type", "Topic", "Shown", "Correct", "Acc"
    ))?;
    console.say("-".repeat(62))?;
    for question in questions {
        let topic: String = question.topic.chars().take(20).collect();
        console.say(format!(
            "{:8} {:3} {:8} {:20} {:>5} {:>7} {:>5}",
            question.short_id(),
            if question.active { "Y" } else { "N" },
            question.kind().label(),
            topic,
            question.stats.times_shown,
            question.stats.times_correct,
            accuracy_label(&question.stats)
        ))?;
    }

    let totals = quiz.summary();
    console.say("-".repeat(62))?;
    console.say(format!(
        "{} questions ({} active), answered {} times, {} correct, accuracy {}",
        questions.len(),
        quiz.active_questions().len(),
        totals.times_shown,
        totals.times_correct,
        accuracy_label(&totals)
    ))?;
    Ok(())
}

fn accuracy_label(stats: &QuestionStats) -> String {
    match stats.accuracy() {
        Some(accuracy) => format!("{:.0}%", accuracy * 100.0),
        None => "--".to_string(),
    }
}

//! services/cli/src/adapters/prompts.rs
//!
//! Prompt text sent to the language model. Nothing else in the crate builds
//! model-facing strings.

pub const GENERATE_INSTRUCTIONS: &str = r#"You are a helpful tutor for a beginner-level student.
Your task is to generate practice questions about a given topic.

Return VALID JSON ONLY, no extra text.
The JSON must have exactly this shape:

{
  "mcq": [
    {"question": "...", "options": ["...","..."], "correct_index": 0}
  ],
  "freeform": [
    {"question": "...", "reference_answer": "..."}
  ]
}

Rules:
- Stay strictly on the given topic.
- Use the same language as the topic.
- Questions must be short, clear, and pedagogical.
- Multiple-choice options must be distinct and plausible.
- "correct_index" is zero-based. Vary its position across questions."#;

pub const EVALUATE_INSTRUCTIONS: &str = r#"You are a strict but kind tutor.

Decide if the student's answer is correct based ONLY on the reference answer.
If it is mostly correct and covers the key idea, treat it as correct even if
wording or order differs.

Return VALID JSON ONLY, in the form:
{ "correct": true/false, "explanation": "short explanation" }

Rules:
- Explanation must be brief, neutral, and constructive.
- Ignore small grammar and spelling mistakes."#;

/// User turn for question generation.
pub fn generation_input(topic: &str, count: usize) -> String {
    format!(
        "TOPIC: {topic}\n\n\
         Create {count} questions in total to help a beginner learn about this topic.\n\
         Include at least one multiple-choice question and at least one freeform question."
    )
}

/// User turn for grading. Each value is inserted once, verbatim, so braces in
/// a question or answer are never read as placeholders.
pub fn evaluation_input(question: &str, reference: &str, answer: &str) -> String {
    format!(
        "QUESTION:\n{question}\n\n\
         REFERENCE ANSWER:\n{reference}\n\n\
         STUDENT ANSWER:\n{answer}"
    )
}

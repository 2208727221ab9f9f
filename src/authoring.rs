//! Question authoring from a line-command script, and printable sheets.
//!
//! ```text
//! /q What does ACID stand for?
//! /o Atomicity, Consistency, Isolation, Durability
//! /o Availability, Consistency, Integrity, Durability
//! /c 1
//! /r https://en.wikipedia.org/wiki/ACID
//! ```
//!
//! `/o` fills the next free option slot, `/oN` fills slot `N`. `/c` and `/p`
//! take comma-separated option numbers; numbers without an option are dropped.
//! Blank lines and lines starting with `#` are ignored.

use std::fmt::Write as _;

use crate::error::AuthoringError;
use crate::question::{AnswerSet, Question, MAX_OPTIONS};

#[derive(Debug, Default)]
struct Draft {
    line: usize,
    text: Option<String>,
    slots: [Option<String>; MAX_OPTIONS],
    filled: usize,
    correct: Option<Vec<usize>>,
    proposed: Vec<usize>,
    resource: Option<String>,
}

impl Draft {
    fn starting_at(line: usize) -> Self {
        Self {
            line,
            ..Default::default()
        }
    }

    fn set_option(&mut self, slot: Option<usize>, text: &str, line: usize) -> Result<(), AuthoringError> {
        let number = slot.unwrap_or(self.filled + 1);
        if !(1..=MAX_OPTIONS).contains(&number) {
            return Err(AuthoringError::BadLine {
                line,
                reason: format!("option number must be between 1 and {MAX_OPTIONS}"),
            });
        }
        self.slots[number - 1] = Some(text.to_string());
        self.filled = self.filled.max(number);
        Ok(())
    }

    fn resolve(&self, numbers: &[usize]) -> AnswerSet {
        AnswerSet::from_values(
            numbers
                .iter()
                .filter_map(|n| n.checked_sub(1).and_then(|i| self.slots.get(i)))
                .flatten(),
        )
    }

    fn finish(self, index: usize) -> Result<Question, AuthoringError> {
        let text = self
            .text
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(AuthoringError::MissingText(index))?;
        let correct = self
            .correct
            .as_deref()
            .map(|c| self.resolve(c))
            .filter(|c| !c.is_empty())
            .ok_or(AuthoringError::MissingCorrectAnswer(index))?;

        let mut question = Question::new(text, self.slots.iter().flatten(), correct);
        question.proposed_answer = self.resolve(&self.proposed);
        question.resource = self.resource.clone();
        question
            .validate()
            .map_err(|source| AuthoringError::Invalid { index, source })?;
        log::trace!("question {index} authored from line {}", self.line);
        Ok(question)
    }
}

fn parse_numbers(list: &str, line: usize) -> Result<Vec<usize>, AuthoringError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| AuthoringError::BadLine {
                line,
                reason: format!("{s:?} is not an option number"),
            })
        })
        .collect()
}

/// Builds questions from a script. Question numbers in errors start at 1.
pub fn parse_script(script: &str) -> Result<Vec<Question>, AuthoringError> {
    let mut questions = Vec::new();
    let mut draft: Option<Draft> = None;

    for (n, raw) in script.lines().enumerate() {
        let line = n + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(text) = trimmed.strip_prefix("/q") {
            if let Some(done) = draft.take() {
                questions.push(done.finish(questions.len() + 1)?);
            }
            let mut next = Draft::starting_at(line);
            next.text = Some(text.trim().to_string());
            draft = Some(next);
            continue;
        }

        let current = draft.get_or_insert_with(|| Draft::starting_at(line));
        if let Some(rest) = trimmed.strip_prefix("/o") {
            let digits = rest.chars().take_while(char::is_ascii_digit).count();
            let (number, text) = rest.split_at(digits);
            let text = text.trim();
            if text.is_empty() {
                return Err(AuthoringError::BadLine {
                    line,
                    reason: "option text is missing".to_string(),
                });
            }
            let slot = match number {
                "" => None,
                n => Some(n.parse().map_err(|_| AuthoringError::BadLine {
                    line,
                    reason: format!("{n:?} is not an option number"),
                })?),
            };
            current.set_option(slot, text, line)?;
        } else if let Some(list) = trimmed.strip_prefix("/c") {
            current.correct = Some(parse_numbers(list, line)?);
        } else if let Some(list) = trimmed.strip_prefix("/p") {
            current.proposed = parse_numbers(list, line)?;
        } else if let Some(resource) = trimmed.strip_prefix("/r") {
            let resource = resource.trim();
            current.resource = (!resource.is_empty()).then(|| resource.to_string());
        } else {
            return Err(AuthoringError::BadLine {
                line,
                reason: format!("unknown command {trimmed:?}"),
            });
        }
    }

    if let Some(done) = draft {
        questions.push(done.finish(questions.len() + 1)?);
    }
    Ok(questions)
}

/// Plain-text printable sheet of `questions`
pub fn render_sheet(questions: &[Question], include_solutions: bool, include_resources: bool) -> String {
    let mut out = String::new();
    for (i, q) in questions.iter().enumerate() {
        let _ = write!(out, "{}. {}\n\n", i + 1, q.text);
        for (n, option) in q.options.iter().enumerate() {
            let _ = writeln!(out, "   {}. {option}", n + 1);
        }
        if include_solutions {
            let _ = write!(
                out,
                "\nCorrect Answer: {}\nProposed Answer: {}\n",
                q.correct_answer.values().join(", "),
                q.proposed_answer.values().join(", ")
            );
        }
        if let Some(resource) = q.resource.as_deref().filter(|_| include_resources) {
            let _ = writeln!(out, "\nResource: {resource}");
        }
        out.push_str("\n---\n\n");
    }
    out
}

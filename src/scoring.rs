use chrono::{DateTime, Utc};

use crate::history::{HistoryEntry, QuizResult};
use crate::question::{AnswerSet, Question};

/// Scores one answered question.
///
/// Multi-answer questions earn the fraction of correct options that were picked;
/// wrong extra picks cost nothing. Single-answer questions are all or nothing.
pub fn score_question(question: &Question, user_answers: &AnswerSet) -> QuizResult {
    let correct = &question.correct_answer;
    let is_fully_correct = user_answers.same_members(correct);
    let partial_score = if question.is_multi_answer() {
        user_answers.intersection_len(correct) as f64 / correct.len() as f64
    } else if is_fully_correct {
        1.0
    } else {
        0.0
    };

    QuizResult {
        question: question.clone(),
        user_answers: user_answers.clone(),
        is_fully_correct,
        partial_score,
    }
}

/// Aggregates per-question results into a history entry
pub fn build_entry(
    topic: &str,
    requested_count: usize,
    time_spent_seconds: u32,
    results: Vec<QuizResult>,
    date: DateTime<Utc>,
) -> HistoryEntry {
    let total_score: f64 = results.iter().map(|r| r.partial_score).sum();
    let percentage = if requested_count == 0 {
        0.0
    } else {
        total_score / requested_count as f64 * 100.0
    };
    let correct_count = results.iter().filter(|r| r.is_fully_correct).count();
    let partial_count = results
        .iter()
        .filter(|r| r.partial_score > 0.0 && r.partial_score < 1.0)
        .count();

    HistoryEntry {
        date,
        topic: topic.to_string(),
        total_questions: requested_count,
        total_score,
        percentage,
        correct_count,
        partial_count,
        time_spent_seconds,
        results,
    }
}

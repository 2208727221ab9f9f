use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::json_file::{read_json, write_json};
use crate::question::{AnswerSet, Question};
use crate::util::mean;

/// Outcome of one question in a finished quiz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub question: Question,
    pub user_answers: AnswerSet,
    #[serde(rename = "isCorrect")]
    pub is_fully_correct: bool,
    pub partial_score: f64,
}

/// Summary of one completed quiz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub date: DateTime<Utc>,
    pub topic: String,
    pub total_questions: usize,
    #[serde(rename = "score")]
    pub total_score: f64,
    pub percentage: f64,
    #[serde(rename = "correctAnswers")]
    pub correct_count: usize,
    #[serde(rename = "partialAnswers")]
    pub partial_count: usize,
    #[serde(rename = "timeSpent")]
    pub time_spent_seconds: u32,
    pub results: Vec<QuizResult>,
}

/// Append-only (newest first) log of completed quizzes that can be wiped as a whole
pub trait HistoryStore {
    fn append(&self, entry: &HistoryEntry) -> Result<(), StoreError>;
    fn list(&self) -> Result<Vec<HistoryEntry>, StoreError>;
    fn reset(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    fn load(&self) -> Result<Option<Vec<HistoryEntry>>, StoreError> {
        match read_json(&self.path, "quiz history") {
            Ok(entries) => Ok(Some(entries)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl HistoryStore for FileHistoryStore {
    fn append(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
        // a history file that exists but does not parse is an error, never silently replaced
        let mut entries = self.load()?.unwrap_or_default();
        entries.insert(0, entry.clone());
        write_json(&self.path, &entries, "quiz history")?;
        log::info!(
            "recorded quiz on {} ({:.1}%), {} entries in history",
            entry.topic,
            entry.percentage,
            entries.len()
        );
        Ok(())
    }

    fn list(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        match self.load()? {
            Some(entries) => Ok(entries),
            None => {
                write_json(&self.path, &Vec::<HistoryEntry>::new(), "quiz history")?;
                Ok(Vec::new())
            }
        }
    }

    fn reset(&self) -> Result<(), StoreError> {
        log::info!("resetting quiz history at {}", self.path.display());
        write_json(&self.path, &Vec::<HistoryEntry>::new(), "quiz history")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub total_quizzes: usize,
    pub total_questions: usize,
    pub total_correct: usize,
    pub total_partial: usize,
    pub total_time_spent: u64,
    pub average_percentage: f64,
}

impl HistorySummary {
    pub fn from_entries(entries: &[HistoryEntry]) -> Self {
        let percentages: Vec<f64> = entries.iter().map(|e| e.percentage).collect();
        Self {
            total_quizzes: entries.len(),
            total_questions: entries.iter().map(|e| e.total_questions).sum(),
            total_correct: entries.iter().map(|e| e.correct_count).sum(),
            total_partial: entries.iter().map(|e| e.partial_count).sum(),
            total_time_spent: entries.iter().map(|e| e.time_spent_seconds as u64).sum(),
            average_percentage: mean(&percentages).unwrap_or(0.0),
        }
    }
}

/// Per-topic (quizzes taken, average percentage), ordered by topic
pub fn per_topic(entries: &[HistoryEntry]) -> Vec<(String, usize, f64)> {
    entries
        .iter()
        .into_group_map_by(|e| e.topic.clone())
        .into_iter()
        .map(|(topic, group)| {
            let percentages: Vec<f64> = group.iter().map(|e| e.percentage).collect();
            (topic, group.len(), mean(&percentages).unwrap_or(0.0))
        })
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .collect()
}

const CSV_HEADER: [&str; 8] = [
    "date",
    "topic",
    "total_questions",
    "score",
    "percentage",
    "correct",
    "partial",
    "time_spent_secs",
];

#[derive(Serialize)]
struct CsvRow<'a> {
    date: String,
    topic: &'a str,
    total_questions: usize,
    score: f64,
    percentage: f64,
    correct: usize,
    partial: usize,
    time_spent_secs: u32,
}

/// One CSV row per entry, header included
pub fn export_csv<W: io::Write>(entries: &[HistoryEntry], writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    // written by hand so an empty history still gets its header
    wtr.write_record(CSV_HEADER)?;
    for e in entries {
        wtr.serialize(CsvRow {
            date: e.date.to_rfc3339(),
            topic: &e.topic,
            total_questions: e.total_questions,
            score: e.total_score,
            percentage: e.percentage,
            correct: e.correct_count,
            partial: e.partial_count,
            time_spent_secs: e.time_spent_seconds,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

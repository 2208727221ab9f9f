use crate::error::StartError;
use crate::history::{HistoryEntry, HistoryStore};
use crate::library::{complete_pool, COMPLETE_TEST_LABEL};
use crate::session::{
    pool_from_topic, EndReason, QuizSession, SessionConfig, SessionObserver, SessionReport,
};
use crate::topic_store::{TopicId, TopicStore};
use crate::write_back::apply_quiz_answers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A user-visible notification; persistence failures end up here instead of aborting a quiz
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

/// Drives one quiz session against the topic and history stores
#[derive(Debug)]
pub struct QuizController<T: TopicStore, H: HistoryStore> {
    topics: T,
    history: H,
    session: QuizSession,
    last_entry: Option<HistoryEntry>,
}

impl<T: TopicStore, H: HistoryStore> QuizController<T, H> {
    pub fn new(
        topics: T,
        history: H,
        config: SessionConfig,
        observer: impl SessionObserver + 'static,
    ) -> Self {
        Self {
            topics,
            history,
            session: QuizSession::new(config, observer),
            last_entry: None,
        }
    }

    pub fn topics(&self) -> &T {
        &self.topics
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    /// History entry of the most recently settled quiz
    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.last_entry.as_ref()
    }

    pub fn start_topic(&mut self, id: &TopicId, requested: usize) -> Result<Vec<Notice>, StartError> {
        let questions = self.topics.read_topic(id)?;
        let superseded = self
            .session
            .start(id.as_str(), pool_from_topic(id, questions), requested)?;
        Ok(self.settle_all(superseded))
    }

    /// Quiz over the union of every topic
    pub fn start_complete_test(&mut self, requested: usize) -> Result<Vec<Notice>, StartError> {
        let pool = complete_pool(&self.topics)?;
        let superseded = self.session.start(COMPLETE_TEST_LABEL, pool, requested)?;
        Ok(self.settle_all(superseded))
    }

    pub fn record_answer(&mut self, index: usize, value: &str) {
        self.session.record_answer(index, value);
    }

    pub fn toggle_doubt(&mut self, index: usize) -> bool {
        self.session.toggle_doubt(index)
    }

    pub fn tick(&mut self) -> Vec<Notice> {
        let report = self.session.tick();
        self.settle_all(report)
    }

    /// Manual submission
    pub fn finish(&mut self) -> Vec<Notice> {
        let report = self.session.end(EndReason::Submitted);
        self.settle_all(report)
    }

    /// Leaving the quiz while it runs settles it like a timeout instead of dropping answers
    pub fn abandon(&mut self) -> Vec<Notice> {
        let report = self.session.end(EndReason::Abandoned);
        self.settle_all(report)
    }

    fn settle_all(&mut self, report: Option<SessionReport>) -> Vec<Notice> {
        report.map(|r| self.settle(r)).unwrap_or_default()
    }

    fn settle(&mut self, report: SessionReport) -> Vec<Notice> {
        let mut notices = Vec::new();

        match self.history.append(&report.entry) {
            Ok(()) => notices.push(Notice::info(format!(
                "Quiz {}: {:.1}% saved to history",
                report.reason, report.entry.percentage
            ))),
            Err(e) => {
                log::warn!("quiz history not saved: {e}");
                notices.push(Notice::error(format!("Failed to save quiz history: {e}")));
            }
        }

        for (topic, outcome) in apply_quiz_answers(&self.topics, &report.answers) {
            if let Err(e) = outcome {
                notices.push(Notice::error(format!(
                    "Failed to save answers to {}: {e}",
                    self.topics.display_name(&topic)
                )));
            }
        }

        self.last_entry = Some(report.entry);
        notices
    }
}

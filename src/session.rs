use chrono::Utc;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use std::collections::HashMap;
use std::fmt;

use crate::config::SECONDS_PER_QUESTION;
use crate::error::SessionError;
use crate::history::{HistoryEntry, QuizResult};
use crate::question::{AnswerSet, Question};
use crate::scoring::{build_entry, score_question};
use crate::topic_store::TopicId;

/// Where a quiz question came from, used to write answers back
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuestionOrigin {
    pub topic: TopicId,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PooledQuestion {
    pub origin: QuestionOrigin,
    pub question: Question,
}

/// Tags every question of a topic with its position in that topic
pub fn pool_from_topic(topic: &TopicId, questions: Vec<Question>) -> Vec<PooledQuestion> {
    questions
        .into_iter()
        .enumerate()
        .map(|(position, question)| PooledQuestion {
            origin: QuestionOrigin {
                topic: topic.clone(),
                position,
            },
            question,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    Idle,
    Active,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum EndReason {
    #[strum(serialize = "submitted")]
    Submitted,
    #[strum(serialize = "timed out")]
    TimedOut,
    #[strum(serialize = "abandoned")]
    Abandoned,
}

/// Told when a quiz becomes active or inactive, so surrounding chrome can react
pub trait SessionObserver {
    fn activity_changed(&mut self, active: bool);
}

impl<F: FnMut(bool)> SessionObserver for F {
    fn activity_changed(&mut self, active: bool) {
        self(active)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub seconds_per_question: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seconds_per_question: SECONDS_PER_QUESTION,
        }
    }
}

/// The answer given to one selected question, addressed by its origin
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAnswer {
    pub origin: QuestionOrigin,
    pub text: String,
    pub answers: AnswerSet,
    pub doubt_marked: bool,
}

/// Everything a finished session hands over to the stores
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub reason: EndReason,
    pub entry: HistoryEntry,
    pub answers: Vec<RecordedAnswer>,
}

/// One quiz attempt: Idle -> Active -> Ended, and back to Active only through `start`
pub struct QuizSession {
    config: SessionConfig,
    phase: Phase,
    label: String,
    question_count: usize,
    seconds_remaining: u32,
    selected: Vec<PooledQuestion>,
    answers: HashMap<usize, AnswerSet>,
    doubts: HashMap<usize, bool>,
    results: Option<Vec<QuizResult>>,
    observer: Box<dyn SessionObserver>,
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("phase", &self.phase)
            .field("label", &self.label)
            .field("question_count", &self.question_count)
            .field("seconds_remaining", &self.seconds_remaining)
            .field("answers", &self.answers)
            .finish_non_exhaustive()
    }
}

impl QuizSession {
    pub fn new(config: SessionConfig, observer: impl SessionObserver + 'static) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            label: String::new(),
            question_count: 0,
            seconds_remaining: 0,
            selected: Vec::new(),
            answers: HashMap::new(),
            doubts: HashMap::new(),
            results: None,
            observer: Box::new(observer),
        }
    }

    /// Starts a quiz over a random sample of `pool`.
    ///
    /// `requested` outside `1..=pool.len()` is clamped to the pool size. A session
    /// that is still active is ended first and its report returned.
    pub fn start(
        &mut self,
        label: &str,
        pool: Vec<PooledQuestion>,
        requested: usize,
    ) -> Result<Option<SessionReport>, SessionError> {
        self.start_with_rng(label, pool, requested, &mut thread_rng())
    }

    pub fn start_with_rng<R: Rng + ?Sized>(
        &mut self,
        label: &str,
        mut pool: Vec<PooledQuestion>,
        requested: usize,
        rng: &mut R,
    ) -> Result<Option<SessionReport>, SessionError> {
        if pool.is_empty() {
            return Err(SessionError::EmptyPool);
        }
        let superseded = self.end(EndReason::Abandoned);

        let count = if requested == 0 || requested > pool.len() {
            pool.len()
        } else {
            requested
        };
        pool.shuffle(rng);
        pool.truncate(count);

        self.label = label.to_string();
        self.question_count = count;
        self.seconds_remaining = self.time_budget();
        self.doubts = pool
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.question.is_doubt_marked))
            .collect();
        self.selected = pool;
        self.answers.clear();
        self.results = None;
        self.phase = Phase::Active;
        self.observer.activity_changed(true);

        log::info!(
            "quiz on {} started: {} questions, {}s",
            self.label,
            count,
            self.seconds_remaining
        );
        Ok(superseded)
    }

    /// Selects `value` for question `index`: toggles on multi-answer questions, replaces otherwise.
    ///
    /// Panics when no quiz is active, `index` is out of range, or `value` is not an option.
    pub fn record_answer(&mut self, index: usize, value: &str) {
        assert_eq!(self.phase, Phase::Active, "record_answer on a {} session", self.phase);
        let question = &self
            .selected
            .get(index)
            .unwrap_or_else(|| {
                panic!("question index {index} out of range 0..{}", self.selected.len())
            })
            .question;
        assert!(
            question.has_option(value),
            "{value:?} is not an option of question {index}"
        );

        let multi = question.is_multi_answer();
        let set = self.answers.entry(index).or_default();
        if multi {
            set.toggle(value);
        } else {
            set.replace(value);
        }
    }

    /// Flips the doubt mark of question `index`; persisted when the session ends
    pub fn toggle_doubt(&mut self, index: usize) -> bool {
        assert_eq!(self.phase, Phase::Active, "toggle_doubt on a {} session", self.phase);
        assert!(index < self.selected.len(), "question index {index} out of range");
        let mark = self.doubts.entry(index).or_default();
        *mark = !*mark;
        *mark
    }

    /// One elapsed second. Reaching zero ends the session exactly once.
    pub fn tick(&mut self) -> Option<SessionReport> {
        if self.phase != Phase::Active {
            return None;
        }
        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining == 0 {
            self.end(EndReason::TimedOut)
        } else {
            None
        }
    }

    /// Scores the attempt and leaves the Active phase. `None` when nothing was active.
    pub fn end(&mut self, reason: EndReason) -> Option<SessionReport> {
        if self.phase != Phase::Active {
            return None;
        }

        let empty = AnswerSet::new();
        let results: Vec<QuizResult> = self
            .selected
            .iter()
            .enumerate()
            .map(|(i, p)| score_question(&p.question, self.answers.get(&i).unwrap_or(&empty)))
            .collect();

        let answers = self
            .selected
            .iter()
            .enumerate()
            .map(|(i, p)| RecordedAnswer {
                origin: p.origin.clone(),
                text: p.question.text.clone(),
                answers: self.answers.get(&i).cloned().unwrap_or_default(),
                doubt_marked: self.doubts.get(&i).copied().unwrap_or(false),
            })
            .collect();

        let time_spent = self.time_budget() - self.seconds_remaining;
        let entry = build_entry(
            &self.label,
            self.question_count,
            time_spent,
            results.clone(),
            Utc::now(),
        );

        self.phase = Phase::Ended;
        self.results = Some(results);
        self.observer.activity_changed(false);

        log::info!(
            "quiz on {} {} after {}s: {:.1}%",
            self.label,
            reason,
            time_spent,
            entry.percentage
        );
        Some(SessionReport {
            reason,
            entry,
            answers,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn question_count(&self) -> usize {
        self.question_count
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    /// Seconds for the whole quiz, saturating at `u32::MAX`
    pub fn time_budget(&self) -> u32 {
        u32::try_from(self.question_count)
            .unwrap_or(u32::MAX)
            .saturating_mul(self.config.seconds_per_question)
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.selected.get(index).map(|p| &p.question)
    }

    pub fn selected(&self) -> &[PooledQuestion] {
        &self.selected
    }

    pub fn answers_for(&self, index: usize) -> Option<&AnswerSet> {
        self.answers.get(&index)
    }

    pub fn is_doubt_marked(&self, index: usize) -> bool {
        self.doubts.get(&index).copied().unwrap_or(false)
    }

    pub fn results(&self) -> Option<&[QuizResult]> {
        self.results.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    fn topic() -> TopicId {
        TopicId::parse("sample").unwrap()
    }

    fn pool(n: usize) -> Vec<PooledQuestion> {
        let questions = (0..n)
            .map(|i| {
                Question::new(format!("q{i}"), ["A", "B", "C"], AnswerSet::single("A"))
            })
            .collect();
        pool_from_topic(&topic(), questions)
    }

    fn multi_pool() -> Vec<PooledQuestion> {
        pool_from_topic(
            &topic(),
            vec![Question::new(
                "pick two",
                ["A", "B", "C", "D"],
                AnswerSet::from_values(["A", "B"]),
            )],
        )
    }

    fn session() -> QuizSession {
        QuizSession::new(SessionConfig::default(), |_: bool| {})
    }

    fn recording_session() -> (QuizSession, Rc<RefCell<Vec<bool>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let s = QuizSession::new(SessionConfig::default(), move |active: bool| {
            sink.borrow_mut().push(active)
        });
        (s, seen)
    }

    #[test]
    fn new_session_is_idle() {
        let s = session();
        assert_eq!(s.phase(), Phase::Idle);
        assert!(s.results().is_none());
    }

    #[test]
    fn start_samples_without_duplicates() {
        for n in 1..=6 {
            let mut s = session();
            s.start("sample", pool(6), n).unwrap();
            assert_eq!(s.selected().len(), n);
            let texts: HashSet<_> = s.selected().iter().map(|p| p.question.text.clone()).collect();
            assert_eq!(texts.len(), n);
            for p in s.selected() {
                assert_eq!(p.question.text, format!("q{}", p.origin.position));
            }
        }
    }

    #[test]
    fn start_clamps_out_of_range_counts() {
        let mut s = session();
        s.start("sample", pool(3), 10).unwrap();
        assert_eq!(s.question_count(), 3);

        s.start("sample", pool(3), 0).unwrap();
        assert_eq!(s.question_count(), 3);
    }

    #[test]
    fn huge_per_question_budget_saturates() {
        let mut s = QuizSession::new(
            SessionConfig {
                seconds_per_question: 3_000_000_000,
            },
            |_: bool| {},
        );
        s.start("sample", pool(2), 2).unwrap();
        assert_eq!(s.time_budget(), u32::MAX);
        assert_eq!(s.seconds_remaining(), u32::MAX);
    }

    #[test]
    fn start_on_empty_pool_fails() {
        let mut s = session();
        assert_eq!(s.start("sample", vec![], 3), Err(SessionError::EmptyPool));
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn seeded_starts_are_reproducible_and_independent_otherwise() {
        let order = |seed| {
            let mut s = session();
            s.start_with_rng("sample", pool(8), 8, &mut StdRng::seed_from_u64(seed))
                .unwrap();
            s.selected().iter().map(|p| p.origin.position).collect::<Vec<_>>()
        };
        assert_eq!(order(7), order(7));
        let mut sorted = order(7);
        sorted.sort();
        assert_eq!(sorted, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn start_sets_budget_and_signals_activity() {
        let (mut s, seen) = recording_session();
        s.start("sample", pool(4), 2).unwrap();
        assert_eq!(s.seconds_remaining(), 90);
        assert!(s.is_active());
        assert_eq!(*seen.borrow(), vec![true]);

        s.end(EndReason::Submitted).unwrap();
        assert_eq!(*seen.borrow(), vec![true, false]);
    }

    #[test]
    fn multi_answer_toggle_twice_restores() {
        let mut s = session();
        s.start("sample", multi_pool(), 1).unwrap();
        s.record_answer(0, "A");
        s.record_answer(0, "C");
        s.record_answer(0, "C");
        assert_eq!(s.answers_for(0).unwrap().values(), ["A"]);
    }

    #[test]
    fn single_answer_replaces() {
        let mut s = session();
        s.start("sample", pool(1), 1).unwrap();
        s.record_answer(0, "B");
        s.record_answer(0, "C");
        assert_eq!(s.answers_for(0).unwrap().values(), ["C"]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn record_answer_rejects_bad_index() {
        let mut s = session();
        s.start("sample", pool(2), 2).unwrap();
        s.record_answer(5, "A");
    }

    #[test]
    #[should_panic(expected = "is not an option")]
    fn record_answer_rejects_unknown_option() {
        let mut s = session();
        s.start("sample", pool(2), 2).unwrap();
        s.record_answer(0, "Z");
    }

    #[test]
    #[should_panic(expected = "record_answer on a Idle session")]
    fn record_answer_requires_active_session() {
        let mut s = session();
        s.record_answer(0, "A");
    }

    #[test]
    fn timer_exhaustion_ends_exactly_once() {
        let (mut s, seen) = recording_session();
        s.start("sample", pool(2), 2).unwrap();
        assert_eq!(s.seconds_remaining(), 90);

        let mut reports = Vec::new();
        for _ in 0..89 {
            assert!(s.tick().is_none());
        }
        assert!(s.is_active());
        reports.extend(s.tick());
        for _ in 0..10 {
            reports.extend(s.tick());
        }

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].reason, EndReason::TimedOut);
        assert_eq!(reports[0].entry.time_spent_seconds, 90);
        assert_eq!(s.phase(), Phase::Ended);
        assert_eq!(*seen.borrow(), vec![true, false]);
    }

    #[test]
    fn end_scores_and_reports_elapsed_time() {
        let mut s = session();
        s.start("sample", pool(3), 3).unwrap();
        for _ in 0..10 {
            s.tick();
        }
        s.record_answer(0, "A");
        s.record_answer(1, "B");

        let report = s.end(EndReason::Submitted).unwrap();
        assert_eq!(report.entry.time_spent_seconds, 10);
        assert_eq!(report.entry.total_questions, 3);
        assert_eq!(report.entry.total_score, 1.0);
        assert_eq!(report.entry.correct_count, 1);
        assert_eq!(report.entry.topic, "sample");
        assert_eq!(s.results().unwrap().len(), 3);

        // unanswered questions are written back as an empty selection
        assert!(report.answers[2].answers.is_empty());
        assert_eq!(report.answers[1].answers.values(), ["B"]);
    }

    #[test]
    fn end_twice_settles_once() {
        let mut s = session();
        s.start("sample", pool(1), 1).unwrap();
        assert!(s.end(EndReason::Submitted).is_some());
        assert!(s.end(EndReason::Submitted).is_none());
        assert!(s.tick().is_none());
    }

    #[test]
    fn restart_while_active_settles_previous_session() {
        let mut s = session();
        s.start("first", pool(2), 2).unwrap();
        s.record_answer(0, "A");
        let superseded = s.start("second", pool(3), 1).unwrap().unwrap();
        assert_eq!(superseded.reason, EndReason::Abandoned);
        assert_eq!(superseded.entry.topic, "first");
        assert_eq!(s.label(), "second");
        assert!(s.answers_for(0).is_none());
        assert!(s.results().is_none());
    }

    #[test]
    fn doubt_marks_travel_with_the_report() {
        let mut s = session();
        s.start("sample", pool(2), 2).unwrap();
        assert!(s.toggle_doubt(1));
        assert!(s.is_doubt_marked(1));
        let report = s.end(EndReason::Submitted).unwrap();
        assert!(!report.answers[0].doubt_marked);
        assert!(report.answers[1].doubt_marked);
    }
}

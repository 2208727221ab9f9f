use std::fs;

use assert_matches::assert_matches;
use quizdesk::app_dirs::AppDirs;
use quizdesk::controller::QuizController;
use quizdesk::error::{SessionError, StartError};
use quizdesk::history::{export_csv, FileHistoryStore, HistoryStore, HistorySummary};
use quizdesk::library;
use quizdesk::question::AnswerSet;
use quizdesk::session::SessionConfig;
use quizdesk::topic_store::{FileTopicStore, TopicStore};

const UPLOAD: &str = r#"{
  "questions": [
    { "Question": "Which are JVM languages?", "opt1": "Kotlin", "opt2": "Go", "opt3": "Scala",
      "correctAns": ["Kotlin", "Scala"], "proposedAns": "", "resource": "https://kotlinlang.org" },
    { "Question": "Rust's package manager?", "opt1": "npm", "opt2": "cargo",
      "correctAns": "cargo", "proposedAns": ["cargo"], "isDoubt": true }
  ]
}"#;

fn desk(dirs: &AppDirs) -> QuizController<FileTopicStore, FileHistoryStore> {
    QuizController::new(
        FileTopicStore::from_dirs(dirs),
        FileHistoryStore::with_path(dirs.history_path()),
        SessionConfig::default(),
        |_: bool| {},
    )
}

#[test]
fn imported_topic_quiz_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let dirs = AppDirs::rooted_at(dir.path());
    let store = FileTopicStore::from_dirs(&dirs);
    let id = store.import_topic("Programming Languages", UPLOAD.as_bytes()).unwrap();
    assert_eq!(id.as_str(), "programming-languages");
    assert_eq!(store.display_name(&id), "Programming Languages");

    let mut desk = desk(&dirs);
    desk.start_topic(&id, 10).unwrap();
    assert_eq!(desk.session().question_count(), 2);

    for i in 0..2 {
        let q = desk.session().question(i).unwrap().clone();
        if q.is_multi_answer() {
            desk.record_answer(i, "Kotlin");
            desk.record_answer(i, "Go");
        } else {
            desk.record_answer(i, "cargo");
        }
    }
    for _ in 0..7 {
        desk.tick();
    }
    let notices = desk.finish();
    assert!(notices.iter().all(|n| !n.is_error()), "{notices:?}");

    let entry = &desk.history().list().unwrap()[0];
    assert_eq!(entry.topic, "programming-languages");
    assert_eq!(entry.total_score, 1.5);
    assert_eq!(entry.percentage, 75.0);
    assert_eq!(entry.correct_count, 1);
    assert_eq!(entry.partial_count, 1);
    assert_eq!(entry.time_spent_seconds, 7);

    let stored = store.read_topic(&id).unwrap();
    let jvm = stored.iter().find(|q| q.is_multi_answer()).unwrap();
    assert_eq!(jvm.quiz_answer, Some(AnswerSet::from_values(["Kotlin", "Go"])));
    let cargo = stored.iter().find(|q| !q.is_multi_answer()).unwrap();
    assert_eq!(cargo.quiz_answer, Some(AnswerSet::single("cargo")));
    assert!(cargo.is_doubt_marked);

    let raw = fs::read_to_string(dirs.topics_dir().join("programming-languages.json")).unwrap();
    assert!(raw.contains("\"quizAns\""));
    assert!(raw.contains("\"correctAns\""));
}

#[test]
fn abandoned_quiz_is_settled_and_unanswered_are_blank() {
    let dir = tempfile::tempdir().unwrap();
    let dirs = AppDirs::rooted_at(dir.path());
    let store = FileTopicStore::from_dirs(&dirs);
    let id = store.import_topic("Langs", UPLOAD.as_bytes()).unwrap();

    let mut desk = desk(&dirs);
    desk.start_topic(&id, 1).unwrap();
    desk.toggle_doubt(0);
    desk.abandon();

    let entry = &desk.history().list().unwrap()[0];
    assert_eq!(entry.total_questions, 1);
    assert_eq!(entry.percentage, 0.0);

    let stored = store.read_topic(&id).unwrap();
    let answered: Vec<_> = stored.iter().filter(|q| q.quiz_answer.is_some()).collect();
    assert_eq!(answered.len(), 1);
    assert_eq!(answered[0].quiz_answer, Some(AnswerSet::new()));
}

#[test]
fn complete_test_spans_topics_and_doubts_follow() {
    let dir = tempfile::tempdir().unwrap();
    let dirs = AppDirs::rooted_at(dir.path());
    let store = FileTopicStore::from_dirs(&dirs);
    store.import_topic("First", UPLOAD.as_bytes()).unwrap();
    store.import_topic("Second", UPLOAD.as_bytes()).unwrap();

    let mut desk = desk(&dirs);
    desk.start_complete_test(0).unwrap();
    assert_eq!(desk.session().question_count(), 4);
    for i in 0..4 {
        // the pre-existing mark on the cargo question is cleared, others get one
        desk.toggle_doubt(i);
    }
    desk.finish();

    let doubts = library::doubts(&store).unwrap();
    assert_eq!(doubts.len(), 2);
    for t in doubts {
        assert_eq!(t.questions.len(), 1);
        assert!(t.questions[0].is_multi_answer());
    }
}

#[test]
fn empty_library_cannot_start() {
    let dir = tempfile::tempdir().unwrap();
    let dirs = AppDirs::rooted_at(dir.path());
    let mut desk = desk(&dirs);
    assert_matches!(
        desk.start_complete_test(5),
        Err(StartError::Session(SessionError::EmptyPool))
    );
}

#[test]
fn history_summary_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let dirs = AppDirs::rooted_at(dir.path());
    let store = FileTopicStore::from_dirs(&dirs);
    let id = store.import_topic("Langs", UPLOAD.as_bytes()).unwrap();

    let mut desk = desk(&dirs);
    for _ in 0..2 {
        desk.start_topic(&id, 2).unwrap();
        desk.finish();
    }
    let entries = desk.history().list().unwrap();
    let summary = HistorySummary::from_entries(&entries);
    assert_eq!(summary.total_quizzes, 2);
    assert_eq!(summary.total_questions, 4);

    let mut out = Vec::new();
    export_csv(&entries, &mut out).unwrap();
    let csv = String::from_utf8(out).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.lines().nth(1).unwrap().contains(",langs,"));

    desk.history().reset().unwrap();
    assert!(desk.history().list().unwrap().is_empty());
}

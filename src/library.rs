use crate::error::StoreError;
use crate::question::Question;
use crate::session::{pool_from_topic, PooledQuestion};
use crate::topic_store::{TopicId, TopicStore};

/// Label recorded in history for a quiz drawn from every topic
pub const COMPLETE_TEST_LABEL: &str = "complete-test";

#[derive(Debug, Clone, PartialEq)]
pub struct TopicQuestions {
    pub id: TopicId,
    pub name: String,
    pub questions: Vec<Question>,
}

/// Every readable topic with its questions, in listing order. A topic file that
/// does not parse is logged and left out so the rest stay usable.
pub fn load_all<S: TopicStore + ?Sized>(store: &S) -> Result<Vec<TopicQuestions>, StoreError> {
    let mut topics = Vec::new();
    for id in store.list_topics()? {
        let questions = match store.read_topic(&id) {
            Ok(questions) => questions,
            Err(e @ StoreError::Malformed { .. }) => {
                log::warn!("skipping topic {id}: {e}");
                continue;
            }
            Err(e) => return Err(e),
        };
        topics.push(TopicQuestions {
            name: store.display_name(&id),
            id,
            questions,
        });
    }
    Ok(topics)
}

/// Doubt-marked questions per topic; topics without any are left out
pub fn doubts<S: TopicStore + ?Sized>(store: &S) -> Result<Vec<TopicQuestions>, StoreError> {
    Ok(load_all(store)?
        .into_iter()
        .map(|mut t| {
            t.questions.retain(|q| q.is_doubt_marked);
            t
        })
        .filter(|t| !t.questions.is_empty())
        .collect())
}

/// Union of all topics, each question tagged with its origin
pub fn complete_pool<S: TopicStore + ?Sized>(store: &S) -> Result<Vec<PooledQuestion>, StoreError> {
    Ok(load_all(store)?
        .into_iter()
        .flat_map(|t| pool_from_topic(&t.id, t.questions))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::AnswerSet;
    use crate::topic_store::FileTopicStore;
    use tempfile::{tempdir, TempDir};

    fn q(text: &str, doubt: bool) -> Question {
        let mut q = Question::new(text, ["A", "B"], AnswerSet::single("A"));
        q.is_doubt_marked = doubt;
        q
    }

    fn store() -> (TempDir, FileTopicStore) {
        let dir = tempdir().unwrap();
        let store = FileTopicStore::new(dir.path().join("files"), dir.path().join("topics.json"));
        store
            .write_topic(&TopicId::parse("views").unwrap(), &[q("v1", true), q("v2", false)])
            .unwrap();
        store
            .write_topic(&TopicId::parse("domains").unwrap(), &[q("d1", false)])
            .unwrap();
        (dir, store)
    }

    #[test]
    fn load_all_is_sorted_by_name() {
        let (_dir, store) = store();
        let names: Vec<_> = load_all(&store).unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, ["domains", "views"]);
    }

    #[test]
    fn doubts_keep_only_marked_questions() {
        let (_dir, store) = store();
        let d = doubts(&store).unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].id.as_str(), "views");
        assert_eq!(d[0].questions.len(), 1);
        assert_eq!(d[0].questions[0].text, "v1");
    }

    #[test]
    fn complete_pool_tags_origins() {
        let (_dir, store) = store();
        let pool = complete_pool(&store).unwrap();
        assert_eq!(pool.len(), 3);
        let v2 = pool.iter().find(|p| p.question.text == "v2").unwrap();
        assert_eq!(v2.origin.topic.as_str(), "views");
        assert_eq!(v2.origin.position, 1);
    }

    #[test]
    fn malformed_topic_does_not_hide_the_others() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("files").join("notes.json"), r#"{"title":"x"}"#).unwrap();

        let names: Vec<_> = load_all(&store).unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, ["domains", "views"]);
        assert_eq!(complete_pool(&store).unwrap().len(), 3);
        assert_eq!(doubts(&store).unwrap().len(), 1);
    }
}

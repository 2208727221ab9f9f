use crate::error::StoreError;
use crate::question::{AnswerField, Question};
use crate::topic_store::{TopicId, TopicStore};

/// How a selection applies to an answer field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectMode {
    /// Toggle when the question is multi-answer, replace otherwise
    #[default]
    Auto,
    Single,
    Multi,
}

/// Edits a topic outside of a quiz; every change rewrites the whole topic at once
#[derive(Debug)]
pub struct TopicEditor<'s, S: TopicStore + ?Sized> {
    store: &'s S,
    topic: TopicId,
    questions: Vec<Question>,
}

impl<'s, S: TopicStore + ?Sized> TopicEditor<'s, S> {
    pub fn open(store: &'s S, topic: TopicId) -> Result<Self, StoreError> {
        let questions = store.read_topic(&topic)?;
        Ok(Self {
            store,
            topic,
            questions,
        })
    }

    pub fn topic(&self) -> &TopicId {
        &self.topic
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn select_option(
        &mut self,
        index: usize,
        field: AnswerField,
        value: &str,
        mode: SelectMode,
    ) -> Result<(), StoreError> {
        self.edit(index, |q| {
            let multi = match mode {
                SelectMode::Auto => q.is_multi_answer(),
                SelectMode::Single => false,
                SelectMode::Multi => true,
            };
            let set = q.answer_mut(field);
            if multi {
                set.toggle(value);
            } else {
                set.replace(value);
            }
        })
    }

    pub fn set_doubt(&mut self, index: usize, marked: bool) -> Result<(), StoreError> {
        self.edit(index, |q| q.is_doubt_marked = marked)
    }

    /// An empty resource clears it
    pub fn set_resource(&mut self, index: usize, resource: &str) -> Result<(), StoreError> {
        let resource = resource.trim();
        self.edit(index, |q| {
            q.resource = (!resource.is_empty()).then(|| resource.to_string())
        })
    }

    /// Writes the current questions again, e.g. after a failed write
    pub fn save(&self) -> Result<(), StoreError> {
        self.store.write_topic(&self.topic, &self.questions)
    }

    /// Applies `change` to a copy of question `index`. An edit that breaks the
    /// question is not kept; a failed write keeps it in memory for `save`.
    fn edit(&mut self, index: usize, change: impl FnOnce(&mut Question)) -> Result<(), StoreError> {
        let what = format!("question {index} of topic {}", self.topic);
        let current = self
            .questions
            .get(index)
            .ok_or_else(|| StoreError::NotFound(what.clone()))?;

        let mut edited = current.clone();
        change(&mut edited);
        edited
            .validate()
            .map_err(|e| StoreError::malformed(&what, e.to_string()))?;

        self.questions[index] = edited;
        self.save()?;
        log::debug!("saved edit of {what}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::AnswerSet;
    use crate::topic_store::FileTopicStore;
    use assert_matches::assert_matches;
    use tempfile::{tempdir, TempDir};

    fn store() -> (TempDir, FileTopicStore, TopicId) {
        let dir = tempdir().unwrap();
        let store = FileTopicStore::new(dir.path().join("files"), dir.path().join("topics.json"));
        let id = TopicId::parse("views").unwrap();
        store
            .write_topic(
                &id,
                &[
                    Question::new("single", ["A", "B", "C"], AnswerSet::single("A")),
                    Question::new("multi", ["A", "B", "C"], AnswerSet::from_values(["A", "B"])),
                ],
            )
            .unwrap();
        (dir, store, id)
    }

    #[test]
    fn single_answer_selection_replaces() {
        let (_dir, store, id) = store();
        let mut editor = TopicEditor::open(&store, id.clone()).unwrap();
        editor
            .select_option(0, AnswerField::Proposed, "B", SelectMode::Auto)
            .unwrap();
        editor
            .select_option(0, AnswerField::Proposed, "C", SelectMode::Auto)
            .unwrap();

        let stored = store.read_topic(&id).unwrap();
        assert_eq!(stored[0].proposed_answer, AnswerSet::single("C"));
    }

    #[test]
    fn multi_answer_selection_toggles() {
        let (_dir, store, id) = store();
        let mut editor = TopicEditor::open(&store, id.clone()).unwrap();
        editor
            .select_option(1, AnswerField::Correct, "C", SelectMode::Auto)
            .unwrap();
        editor
            .select_option(1, AnswerField::Correct, "A", SelectMode::Auto)
            .unwrap();

        let stored = store.read_topic(&id).unwrap();
        assert_eq!(stored[1].correct_answer, AnswerSet::from_values(["B", "C"]));
    }

    #[test]
    fn explicit_multi_turns_single_into_multi() {
        let (_dir, store, id) = store();
        let mut editor = TopicEditor::open(&store, id.clone()).unwrap();
        editor
            .select_option(0, AnswerField::Correct, "B", SelectMode::Multi)
            .unwrap();
        assert!(store.read_topic(&id).unwrap()[0].is_multi_answer());
    }

    #[test]
    fn edit_breaking_the_question_is_rejected() {
        let (_dir, store, id) = store();
        let mut editor = TopicEditor::open(&store, id.clone()).unwrap();
        let res = editor.select_option(0, AnswerField::Proposed, "Z", SelectMode::Auto);
        assert_matches!(res, Err(StoreError::Malformed { .. }));
        // clearing the only correct answer
        let res = editor.select_option(0, AnswerField::Correct, "A", SelectMode::Multi);
        assert_matches!(res, Err(StoreError::Malformed { .. }));
        assert_eq!(editor.questions()[0].correct_answer, AnswerSet::single("A"));
    }

    #[test]
    fn doubt_and_resource_are_persisted() {
        let (_dir, store, id) = store();
        let mut editor = TopicEditor::open(&store, id.clone()).unwrap();
        editor.set_doubt(1, true).unwrap();
        editor.set_resource(1, " https://example.org ").unwrap();

        let stored = store.read_topic(&id).unwrap();
        assert!(stored[1].is_doubt_marked);
        assert_eq!(stored[1].resource.as_deref(), Some("https://example.org"));

        editor.set_resource(1, "").unwrap();
        assert_eq!(store.read_topic(&id).unwrap()[1].resource, None);
    }

    #[test]
    fn out_of_range_index_is_not_found() {
        let (_dir, store, id) = store();
        let mut editor = TopicEditor::open(&store, id).unwrap();
        assert_matches!(editor.set_doubt(7, true), Err(StoreError::NotFound(_)));
    }
}

use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::json_file::{read_json, write_json};
use crate::question::Question;

static STARTER_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/starter");

/// Identifies a topic file by its stem, e.g. `data-types` for `files/data-types.json`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(String);

impl TopicId {
    /// Accepts a bare stem as well as the `files/<stem>.json` form
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let stem = raw.trim();
        let stem = stem.strip_prefix("files/").unwrap_or(stem);
        let stem = stem.strip_suffix(".json").unwrap_or(stem);
        if stem.is_empty() || stem.contains(['/', '\\']) || stem.starts_with('.') {
            return Err(StoreError::malformed(
                "topic id",
                format!("{raw:?} is not a topic file name"),
            ));
        }
        Ok(TopicId(stem.to_string()))
    }

    /// Slug used when a topic is imported under a display name
    pub fn from_name(name: &str) -> Self {
        let slug = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' })
            .collect();
        TopicId(slug)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Question-set persistence, one whole document per topic
pub trait TopicStore {
    fn list_topics(&self) -> Result<Vec<TopicId>, StoreError>;
    fn read_topic(&self, id: &TopicId) -> Result<Vec<Question>, StoreError>;
    /// Whole-file overwrite; questions are validated before anything is written
    fn write_topic(&self, id: &TopicId, questions: &[Question]) -> Result<(), StoreError>;

    fn display_name(&self, id: &TopicId) -> String {
        id.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: TopicId,
    pub name: String,
}

/// Display names for topics, kept next to the topic files
#[derive(Debug, Clone)]
pub struct TopicCatalog {
    path: PathBuf,
}

impl TopicCatalog {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn entries(&self) -> Vec<CatalogEntry> {
        match read_json(&self.path, "topic catalog") {
            Ok(entries) => entries,
            Err(StoreError::NotFound(_)) => Vec::new(),
            Err(e) => {
                log::warn!("ignoring topic catalog: {e}");
                Vec::new()
            }
        }
    }

    pub fn name_of(&self, id: &TopicId) -> Option<String> {
        self.entries()
            .into_iter()
            .find(|e| &e.id == id)
            .map(|e| e.name)
    }

    pub fn register(&self, id: &TopicId, name: &str) -> Result<(), StoreError> {
        let mut entries = self.entries();
        entries.retain(|e| &e.id != id);
        entries.push(CatalogEntry {
            id: id.clone(),
            name: name.to_string(),
        });
        entries.sort_by_key(|e| e.name.to_lowercase());
        write_json(&self.path, &entries, "topic catalog")
    }
}

#[derive(Debug, Clone)]
pub struct FileTopicStore {
    dir: PathBuf,
    catalog: TopicCatalog,
}

impl FileTopicStore {
    pub fn new<P: AsRef<Path>, C: AsRef<Path>>(dir: P, catalog_path: C) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            catalog: TopicCatalog::with_path(catalog_path),
        }
    }

    pub fn from_dirs(dirs: &crate::app_dirs::AppDirs) -> Self {
        Self::new(dirs.topics_dir(), dirs.catalog_path())
    }

    pub fn catalog(&self) -> &TopicCatalog {
        &self.catalog
    }

    fn path_of(&self, id: &TopicId) -> PathBuf {
        self.dir.join(id.file_name())
    }

    /// Stores an uploaded document (`{"questions": [...]}`) as a new topic named `name`
    pub fn import_topic(&self, name: &str, bytes: &[u8]) -> Result<TopicId, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::malformed("upload", "a topic name is required"));
        }
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| StoreError::malformed("upload", format!("invalid JSON file: {e}")))?;
        let questions = match value.get("questions") {
            Some(Value::Array(items)) => questions_from_values(items.clone(), "upload")?,
            _ => {
                return Err(StoreError::malformed(
                    "upload",
                    "invalid JSON structure, must contain a questions array",
                ))
            }
        };

        let id = self.save_named_topic(name, &questions)?;
        log::info!("imported {} questions as topic {id}", questions.len());
        Ok(id)
    }

    /// Writes `questions` as the topic derived from `name` and records the display name
    pub fn save_named_topic(&self, name: &str, questions: &[Question]) -> Result<TopicId, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::malformed("topic", "a topic name is required"));
        }
        let id = TopicId::from_name(name);
        if self.path_of(&id).exists() {
            log::warn!("topic {id} is replaced by {name:?}");
        }
        self.write_topic(&id, questions)?;
        self.catalog.register(&id, name)?;
        Ok(id)
    }

    /// Writes the bundled starter topics on first run, when the topics directory
    /// does not exist yet. Topics the user deleted later are not brought back.
    pub fn seed_starter_topics(&self) -> Result<usize, StoreError> {
        if self.dir.exists() {
            return Ok(0);
        }
        let mut seeded = 0;
        for file in STARTER_DIR.files() {
            let Some(name) = file.path().file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let target = self.dir.join(name);
            fs::create_dir_all(&self.dir).map_err(|source| StoreError::Write {
                path: self.dir.clone(),
                source,
            })?;
            fs::write(&target, file.contents()).map_err(|source| StoreError::Write {
                path: target.clone(),
                source,
            })?;
            seeded += 1;
        }
        log::info!("seeded {seeded} starter topics into {}", self.dir.display());
        Ok(seeded)
    }
}

impl TopicStore for FileTopicStore {
    fn list_topics(&self) -> Result<Vec<TopicId>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| StoreError::Read {
                    path: self.dir.clone(),
                    source,
                })?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Ok(id) = TopicId::parse(stem) {
                    ids.push(id);
                }
            }
        }

        let catalog = self.catalog.entries();
        let name = |id: &TopicId| {
            catalog
                .iter()
                .find(|e| &e.id == id)
                .map(|e| e.name.to_lowercase())
                .unwrap_or_else(|| id.as_str().to_lowercase())
        };
        ids.sort_by(|a, b| name(a).cmp(&name(b)).then_with(|| a.cmp(b)));
        Ok(ids)
    }

    fn read_topic(&self, id: &TopicId) -> Result<Vec<Question>, StoreError> {
        let what = format!("topic {id}");
        let value: Value = read_json(&self.path_of(id), &what)?;
        let questions = match value {
            Value::Array(items) => questions_from_values(items, &what)?,
            Value::Object(mut map) => match map.remove("questions") {
                Some(Value::Array(items)) => questions_from_values(items, &what)?,
                _ => return Err(StoreError::malformed(what, "expected a list of questions")),
            },
            _ => return Err(StoreError::malformed(what, "expected a list of questions")),
        };
        log::debug!("read {} questions from topic {id}", questions.len());
        Ok(questions)
    }

    fn write_topic(&self, id: &TopicId, questions: &[Question]) -> Result<(), StoreError> {
        let what = format!("topic {id}");
        for (i, q) in questions.iter().enumerate() {
            q.validate()
                .map_err(|e| StoreError::malformed(&what, format!("question {}: {e}", i + 1)))?;
        }
        write_json(&self.path_of(id), questions, &what)
    }

    fn display_name(&self, id: &TopicId) -> String {
        self.catalog.name_of(id).unwrap_or_else(|| id.to_string())
    }
}

fn questions_from_values(items: Vec<Value>, what: &str) -> Result<Vec<Question>, StoreError> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item)
                .map_err(|e| StoreError::malformed(what, format!("question {}: {e}", i + 1)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::AnswerSet;
    use assert_matches::assert_matches;
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    fn store() -> (TempDir, FileTopicStore) {
        let dir = tempdir().unwrap();
        let store = FileTopicStore::new(dir.path().join("files"), dir.path().join("topics.json"));
        (dir, store)
    }

    fn question(text: &str) -> Question {
        Question::new(text, ["A", "B", "C"], AnswerSet::single("B"))
    }

    #[test]
    fn topic_id_accepts_file_paths_and_rejects_traversal() {
        assert_eq!(TopicId::parse("files/Views.json").unwrap().as_str(), "Views");
        assert_eq!(TopicId::parse("Views").unwrap().as_str(), "Views");
        assert!(TopicId::parse("../etc/passwd").is_err());
        assert!(TopicId::parse("").is_err());
    }

    #[test]
    fn topic_id_from_name_slugifies() {
        assert_eq!(TopicId::from_name("Lock Objects #2").as_str(), "lock-objects--2");
    }

    #[test]
    fn write_then_read_preserves_order() {
        let (_dir, store) = store();
        let id = TopicId::parse("order").unwrap();
        let questions = vec![question("first"), question("second"), question("third")];
        store.write_topic(&id, &questions).unwrap();

        let back = store.read_topic(&id).unwrap();
        let texts: Vec<_> = back.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
    }

    #[test]
    fn missing_topic_is_not_found() {
        let (_dir, store) = store();
        let res = store.read_topic(&TopicId::parse("ghost").unwrap());
        assert_matches!(res, Err(StoreError::NotFound(_)));
    }

    #[test]
    fn invalid_question_is_rejected_before_write() {
        let (dir, store) = store();
        let id = TopicId::parse("bad").unwrap();
        let mut q = question("broken");
        q.correct_answer = AnswerSet::single("Z");
        let res = store.write_topic(&id, &[q]);
        assert_matches!(res, Err(StoreError::Malformed { .. }));
        assert!(!dir.path().join("files").join("bad.json").exists());
    }

    #[test]
    fn list_only_json_sorted_by_display_name() {
        let (dir, store) = store();
        for name in ["zeta", "Alpha", "mid"] {
            store
                .write_topic(&TopicId::parse(name).unwrap(), &[question("q")])
                .unwrap();
        }
        fs::write(dir.path().join("files").join("notes.txt"), "x").unwrap();
        store
            .catalog()
            .register(&TopicId::parse("zeta").unwrap(), "Basics")
            .unwrap();

        let ids: Vec<String> = store
            .list_topics()
            .unwrap()
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(ids, ["Alpha", "zeta", "mid"]);
        assert_eq!(store.display_name(&TopicId::parse("zeta").unwrap()), "Basics");
        assert_eq!(store.display_name(&TopicId::parse("mid").unwrap()), "mid");
    }

    #[test]
    fn list_of_missing_dir_is_empty() {
        let (_dir, store) = store();
        assert!(store.list_topics().unwrap().is_empty());
    }

    #[test]
    fn import_requires_questions_array() {
        let (_dir, store) = store();
        let res = store.import_topic("Views", br#"[{"Question": "q"}]"#);
        assert_matches!(res, Err(StoreError::Malformed { reason, .. }) if reason.contains("questions array"));

        let res = store.import_topic("Views", b"not json");
        assert_matches!(res, Err(StoreError::Malformed { reason, .. }) if reason.contains("invalid JSON"));
    }

    #[test]
    fn import_writes_normalized_topic_and_registers_name() {
        let (_dir, store) = store();
        let upload = json!({
            "questions": [
                { "Question": "Pick B", "opt1": "A", "opt2": "B", "correctAns": "B", "proposedAns": "" }
            ]
        });
        let id = store
            .import_topic("Search Help", upload.to_string().as_bytes())
            .unwrap();
        assert_eq!(id.as_str(), "search-help");
        assert_eq!(store.display_name(&id), "Search Help");

        let questions = store.read_topic(&id).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct_answer.values(), ["B"]);
    }

    #[test]
    fn import_reports_which_question_failed() {
        let (_dir, store) = store();
        let upload = json!({
            "questions": [
                { "Question": "ok", "opt1": "A", "correctAns": "A" },
                { "Question": "bad", "opt1": "A", "correctAns": "Q" }
            ]
        });
        let res = store.import_topic("T", upload.to_string().as_bytes());
        assert_matches!(res, Err(StoreError::Malformed { reason, .. }) if reason.starts_with("question 2"));
    }

    #[test]
    fn reads_wrapped_question_documents() {
        let (dir, store) = store();
        fs::create_dir_all(dir.path().join("files")).unwrap();
        fs::write(
            dir.path().join("files").join("wrapped.json"),
            json!({ "questions": [{ "Question": "q", "opt1": "A", "correctAns": "A" }] }).to_string(),
        )
        .unwrap();
        let questions = store.read_topic(&TopicId::parse("wrapped").unwrap()).unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[test]
    fn seeding_only_happens_once() {
        let (_dir, store) = store();
        let seeded = store.seed_starter_topics().unwrap();
        assert!(seeded > 0);
        assert_eq!(store.seed_starter_topics().unwrap(), 0);
        for id in store.list_topics().unwrap() {
            assert!(!store.read_topic(&id).unwrap().is_empty());
        }
    }

    #[test]
    fn deleted_starter_topics_stay_deleted() {
        let (_dir, store) = store();
        store.seed_starter_topics().unwrap();
        for id in store.list_topics().unwrap() {
            fs::remove_file(store.path_of(&id)).unwrap();
        }
        assert_eq!(store.seed_starter_topics().unwrap(), 0);
        assert!(store.list_topics().unwrap().is_empty());
    }
}

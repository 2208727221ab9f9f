use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

pub const MAX_OPTIONS: usize = 4;

/// Ordered, duplicate-free set of option values.
///
/// On disk an answer may be a single string or a list; both load into the same
/// representation and it is always written back as a list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AnswerSet(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAnswer {
    One(String),
    Many(Vec<String>),
}

impl<'de> Deserialize<'de> for AnswerSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<RawAnswer>::deserialize(deserializer)? {
            None => AnswerSet::default(),
            Some(RawAnswer::One(value)) => AnswerSet::from_values([value]),
            Some(RawAnswer::Many(values)) => AnswerSet::from_values(values),
        })
    }
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set, dropping empty strings and repeated values
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = AnswerSet::default();
        for value in values {
            let value = value.into();
            if !value.is_empty() && !set.contains(&value) {
                set.0.push(value);
            }
        }
        set
    }

    pub fn single(value: impl Into<String>) -> Self {
        Self::from_values([value.into()])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|v| v == value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    /// Adds `value` when absent, removes it when present
    pub fn toggle(&mut self, value: &str) {
        if let Some(pos) = self.0.iter().position(|v| v == value) {
            self.0.remove(pos);
        } else {
            self.0.push(value.to_string());
        }
    }

    /// Leaves exactly `{value}`
    pub fn replace(&mut self, value: &str) {
        self.0.clear();
        self.0.push(value.to_string());
    }

    /// Set equality: same size and same members, order ignored
    pub fn same_members(&self, other: &AnswerSet) -> bool {
        self.len() == other.len() && self.iter().all(|v| other.contains(v))
    }

    pub fn intersection_len(&self, other: &AnswerSet) -> usize {
        self.iter().filter(|v| other.contains(v)).count()
    }
}

impl<'a> IntoIterator for &'a AnswerSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Which persisted answer field an edit targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum AnswerField {
    #[strum(serialize = "proposed answer")]
    Proposed,
    #[strum(serialize = "correct answer")]
    Correct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource<'a> {
    Link(&'a str),
    Reference(&'a str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QuestionRecord", into = "QuestionRecord")]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: AnswerSet,
    pub proposed_answer: AnswerSet,
    pub quiz_answer: Option<AnswerSet>,
    pub resource: Option<String>,
    pub is_doubt_marked: bool,
}

impl Question {
    pub fn new<S: Into<String>>(
        text: impl Into<String>,
        options: impl IntoIterator<Item = S>,
        correct_answer: AnswerSet,
    ) -> Self {
        Self {
            text: text.into(),
            options: options.into_iter().map(Into::into).collect(),
            correct_answer,
            proposed_answer: AnswerSet::default(),
            quiz_answer: None,
            resource: None,
            is_doubt_marked: false,
        }
    }

    pub fn is_multi_answer(&self) -> bool {
        self.correct_answer.len() > 1
    }

    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o == value)
    }

    /// Option text for a 1-based option number
    pub fn option_at(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|i| self.options.get(i))
            .map(String::as_str)
    }

    pub fn answer(&self, field: AnswerField) -> &AnswerSet {
        match field {
            AnswerField::Proposed => &self.proposed_answer,
            AnswerField::Correct => &self.correct_answer,
        }
    }

    pub fn answer_mut(&mut self, field: AnswerField) -> &mut AnswerSet {
        match field {
            AnswerField::Proposed => &mut self.proposed_answer,
            AnswerField::Correct => &mut self.correct_answer,
        }
    }

    pub fn resource_kind(&self) -> Option<Resource<'_>> {
        self.resource.as_deref().map(|r| {
            if r.starts_with("http") {
                Resource::Link(r)
            } else {
                Resource::Reference(r)
            }
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() {
            return Err(ValidationError::EmptyText);
        }
        if self.options.is_empty() {
            return Err(ValidationError::NoOptions);
        }
        if self.options.len() > MAX_OPTIONS {
            return Err(ValidationError::TooManyOptions(self.options.len()));
        }
        if self.correct_answer.is_empty() {
            return Err(ValidationError::NoCorrectAnswer);
        }

        let fields = [
            ("correctAns", Some(&self.correct_answer)),
            ("proposedAns", Some(&self.proposed_answer)),
            ("quizAns", self.quiz_answer.as_ref()),
        ];
        for (field, set) in fields {
            if let Some(value) = set.into_iter().flatten().find(|v| !self.has_option(v)) {
                return Err(ValidationError::UnknownOption {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

/// On-disk shape of a question
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QuestionRecord {
    #[serde(rename = "Question", alias = "questionText")]
    text: String,
    #[serde(default, alias = "option1", skip_serializing_if = "Option::is_none")]
    opt1: Option<String>,
    #[serde(default, alias = "option2", skip_serializing_if = "Option::is_none")]
    opt2: Option<String>,
    #[serde(default, alias = "option3", skip_serializing_if = "Option::is_none")]
    opt3: Option<String>,
    #[serde(default, alias = "option4", skip_serializing_if = "Option::is_none")]
    opt4: Option<String>,
    #[serde(rename = "correctAns", alias = "correctAnswer")]
    correct: AnswerSet,
    #[serde(rename = "proposedAns", alias = "proposedAnswer", default)]
    proposed: AnswerSet,
    #[serde(
        rename = "quizAns",
        alias = "quizAnswer",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    quiz: Option<AnswerSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource: Option<String>,
    #[serde(rename = "isDoubt", alias = "isDoubtMarked", default)]
    is_doubt: bool,
}

impl TryFrom<QuestionRecord> for Question {
    type Error = ValidationError;

    fn try_from(r: QuestionRecord) -> Result<Self, Self::Error> {
        let options = [r.opt1, r.opt2, r.opt3, r.opt4]
            .into_iter()
            .flatten()
            .filter(|o| !o.is_empty())
            .collect();

        let question = Question {
            text: r.text,
            options,
            correct_answer: r.correct,
            proposed_answer: r.proposed,
            quiz_answer: r.quiz,
            resource: r.resource.filter(|s| !s.is_empty()),
            is_doubt_marked: r.is_doubt,
        };
        question.validate()?;
        Ok(question)
    }
}

impl From<Question> for QuestionRecord {
    fn from(q: Question) -> Self {
        let mut slots = q.options.into_iter().map(Some);
        QuestionRecord {
            text: q.text,
            opt1: slots.next().flatten(),
            opt2: slots.next().flatten(),
            opt3: slots.next().flatten(),
            opt4: slots.next().flatten(),
            correct: q.correct_answer,
            proposed: q.proposed_answer,
            quiz: q.quiz_answer,
            resource: q.resource,
            is_doubt: q.is_doubt_marked,
        }
    }
}

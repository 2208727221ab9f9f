use std::path::PathBuf;
use thiserror::Error;

/// Failures of the file-backed stores (topics, history, catalog, resume token)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The document parsed but does not have the expected shape, or did not parse at all
    #[error("malformed {what}: {reason}")]
    Malformed { what: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {what}: {source}")]
    Encode {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn malformed(what: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::Malformed {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

/// A question that breaks the answer/option invariants
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("question text is empty")]
    EmptyText,
    #[error("question has no options")]
    NoOptions,
    #[error("question has {0} options, at most 4 are allowed")]
    TooManyOptions(usize),
    #[error("question has no correct answer")]
    NoCorrectAnswer,
    #[error("{field} value {value:?} is not one of the options")]
    UnknownOption { field: &'static str, value: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("cannot start a quiz without questions")]
    EmptyPool,
}

/// Write-back of quiz answers could not resolve a question in its originating topic
#[derive(Debug, Error)]
pub enum WriteBackError {
    #[error("question {position} of topic {topic} no longer matches {text:?}")]
    Unresolved {
        topic: String,
        position: usize,
        text: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, PartialEq)]
pub enum AuthoringError {
    #[error("question {0} has no text")]
    MissingText(usize),
    #[error("question {0} has no correct answer")]
    MissingCorrectAnswer(usize),
    #[error("line {line}: {reason}")]
    BadLine { line: usize, reason: String },
    #[error("question {index}: {source}")]
    Invalid {
        index: usize,
        #[source]
        source: ValidationError,
    },
}

/// A quiz could not be started; no session was touched
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::json_file::{read_json, write_json};
use crate::topic_store::TopicId;

pub const RESUME_VERSION: u32 = 1;

/// Where the user left off: the last topic quizzed and the question on screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeToken {
    pub version: u32,
    pub topic: TopicId,
    pub question_index: usize,
}

impl ResumeToken {
    pub fn new(topic: TopicId, question_index: usize) -> Self {
        Self {
            version: RESUME_VERSION,
            topic,
            question_index,
        }
    }
}

pub trait ResumeStore {
    /// `None` when nothing usable is stored
    fn load(&self) -> Option<ResumeToken>;
    fn save(&self, token: &ResumeToken) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct FileResumeStore {
    path: PathBuf,
}

impl FileResumeStore {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl ResumeStore for FileResumeStore {
    fn load(&self) -> Option<ResumeToken> {
        match read_json::<ResumeToken>(&self.path, "resume token") {
            Ok(token) if token.version == RESUME_VERSION => Some(token),
            Ok(token) => {
                log::info!("ignoring resume token version {}", token.version);
                None
            }
            Err(StoreError::NotFound(_)) => None,
            Err(e) => {
                log::warn!("ignoring resume token: {e}");
                None
            }
        }
    }

    fn save(&self, token: &ResumeToken) -> Result<(), StoreError> {
        write_json(&self.path, token, "resume token")
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(StoreError::Write {
                path: self.path.clone(),
                source: e,
            }),
            _ => Ok(()),
        }
    }
}

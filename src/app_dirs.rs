use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "quizdesk";

/// Centralized application directory resolution
#[derive(Debug, Clone, PartialEq)]
pub struct AppDirs {
    data_dir: PathBuf,
    state_dir: PathBuf,
}

impl AppDirs {
    /// Topics and history live under `data_override` when given, otherwise under
    /// the platform data dir. Resume token and log always go to the state dir.
    pub fn resolve(data_override: Option<&Path>) -> Self {
        let data_dir = data_override
            .map(Path::to_path_buf)
            .or_else(|| ProjectDirs::from("", "", APP_NAME).map(|pd| pd.data_dir().to_path_buf()))
            .unwrap_or_else(|| PathBuf::from(APP_NAME));

        let state_dir = if let Some(dir) = data_override {
            dir.join("state")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home).join(".local").join("state").join(APP_NAME)
        } else {
            ProjectDirs::from("", "", APP_NAME)
                .map(|pd| pd.data_local_dir().to_path_buf())
                .unwrap_or_else(|| data_dir.join("state"))
        };

        Self {
            data_dir,
            state_dir,
        }
    }

    /// Everything under one root, used by tests
    pub fn rooted_at<P: AsRef<Path>>(root: P) -> Self {
        Self::resolve(Some(root.as_ref()))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn topics_dir(&self) -> PathBuf {
        self.data_dir.join("files")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("topics.json")
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("quiz-history.json")
    }

    pub fn resume_path(&self) -> PathBuf {
        self.state_dir.join("resume.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("quizdesk.log")
    }
}

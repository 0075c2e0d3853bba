use std::path::{Path, PathBuf};

use tracing::error;

use crate::catalog::{Language, TrainingCatalog};
use crate::config::{AppConfig, DatabaseFiles};
use crate::error::{TrainingError, msg};
use crate::users::UserCatalog;

/// Read-only view of the training database directory.
///
/// Every call reads from disk; nothing is cached between requests.
#[derive(Clone, Debug)]
pub struct TrainingDatabase {
    dir: PathBuf,
    files: DatabaseFiles,
}

impl TrainingDatabase {
    pub fn new(dir: impl Into<PathBuf>, files: DatabaseFiles) -> Self {
        Self {
            dir: dir.into(),
            files,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.database_dir.clone(), cfg.files.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn users(&self) -> Result<UserCatalog, TrainingError> {
        let path = self.dir.join(&self.files.users);
        UserCatalog::load(&path).await.map_err(|e| {
            error!(error = %e, "user database unavailable");
            TrainingError::resource(msg::USER_SETTINGS_LOADING, e)
        })
    }

    pub async fn catalog(&self, language: Language) -> Result<TrainingCatalog, TrainingError> {
        let file = match language {
            Language::En => &self.files.scenarios_en,
            Language::Ja => &self.files.scenarios_ja,
        };
        TrainingCatalog::load(&self.dir.join(file))
            .await
            .map_err(|e| {
                error!(error = %e, %language, "training catalog unavailable");
                TrainingError::resource(msg::TRAINING_SETTINGS_LOADING, e)
            })
    }

    /// Reads a content or range file named by the catalog. `failure` is the
    /// client message used when it cannot be read.
    pub async fn read(&self, name: &str, failure: &'static str) -> Result<String, TrainingError> {
        let path = self.dir.join(name);
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "database file unreadable");
            TrainingError::resource(failure, e)
        })
    }
}

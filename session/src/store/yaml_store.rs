//! YamlFileStore
//! -------------
//! File-backed implementation of `SessionStore` using the registry's
//! compatibility layout:
//!
//! ```yaml
//! - sessions:
//!   - name: Training Session #1
//!     id: '1'
//!     ...
//! ```
//!
//! Writes never leave a half-written registry behind: the new content goes to
//! a hidden sibling `.<file>.tmp`, is synced, then renamed over the target.
//! A missing or empty file is a valid, empty registry.
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::SessionStore;
use crate::model::{Session, SessionSection};

pub struct YamlFileStore {
    path: PathBuf,
}

impl YamlFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "registry".to_string());

        self.path.with_file_name(format!(".{file_name}.tmp"))
    }
}

/// Parses the registry layout. Sections other than `sessions` are ignored.
pub fn decode(text: &str) -> anyhow::Result<Vec<Session>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let doc: Option<Vec<serde_yaml::Value>> =
        serde_yaml::from_str(text).context("registry file is not a YAML sequence")?;

    let mut sessions = Vec::new();
    for item in doc.unwrap_or_default() {
        let is_sessions = item
            .as_mapping()
            .is_some_and(|m| m.contains_key("sessions"));
        if !is_sessions {
            continue;
        }

        let section: SessionSection =
            serde_yaml::from_value(item).context("malformed session record")?;
        sessions.extend(section.sessions);
    }

    Ok(sessions)
}

pub fn encode(sessions: &[Session]) -> anyhow::Result<String> {
    let doc = vec![SessionSection {
        sessions: sessions.to_vec(),
    }];
    serde_yaml::to_string(&doc).context("failed to serialize session records")
}

#[async_trait]
impl SessionStore for YamlFileStore {
    async fn load_all(&self) -> anyhow::Result<Vec<Session>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "registry file not found; starting empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", self.path.display()));
            }
        };

        decode(&text).with_context(|| format!("failed to parse {}", self.path.display()))
    }

    async fn save_all(&self, sessions: &[Session]) -> anyhow::Result<()> {
        let body = encode(sessions)?;
        let tmp = self.temp_path();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut file = tokio::fs::File::create(&tmp)
            .await
            .with_context(|| format!("failed to create {}", tmp.display()))?;
        file.write_all(body.as_bytes())
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        file.sync_all()
            .await
            .with_context(|| format!("failed to sync {}", tmp.display()))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to move registry into {}", self.path.display()))?;

        debug!(path = %self.path.display(), count = sessions.len(), "registry file rewritten");
        Ok(())
    }
}

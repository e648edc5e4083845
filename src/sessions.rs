//! Per-document viewing sessions
//!
//! Remembers where each document was left off, keyed by a fingerprint of
//! the document bytes so renamed or moved files still resume.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewingSession {
    pub file_name: String,
    #[serde(default)]
    pub total_pages: usize,
    pub page: usize,
    pub scale: f32,
    #[serde(default = "default_auto_fit")]
    pub auto_fit: bool,
    pub last_viewed: chrono::DateTime<chrono::Utc>,
}

fn default_auto_fit() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewingSessions {
    documents: HashMap<String, ViewingSession>,
    #[serde(skip)]
    file_path: Option<PathBuf>,
}

/// Stable key for a document's contents
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

impl ViewingSessions {
    pub fn ephemeral() -> Self {
        Self {
            documents: HashMap::new(),
            file_path: None,
        }
    }

    pub fn with_file(file_path: impl Into<PathBuf>) -> Self {
        Self {
            documents: HashMap::new(),
            file_path: Some(file_path.into()),
        }
    }

    /// Default location under the user's data directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("folioview").join("sessions.json"))
    }

    pub fn load_or_ephemeral(file_path: Option<&Path>) -> Self {
        match file_path {
            Some(path) => Self::load_from_file(path).unwrap_or_else(|e| {
                log::error!("Failed to load viewing sessions from {}: {e:#}", path.display());
                Self::with_file(path)
            }),
            None => Self::ephemeral(),
        }
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::with_file(path));
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut sessions: Self = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        sessions.file_path = Some(path.to_path_buf());
        Ok(sessions)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, fingerprint: &str) -> Option<&ViewingSession> {
        self.documents.get(fingerprint)
    }

    pub fn most_recent(&self) -> Option<(&str, &ViewingSession)> {
        self.documents
            .iter()
            .max_by_key(|(_, session)| session.last_viewed)
            .map(|(key, session)| (key.as_str(), session))
    }

    /// Record the current position and persist it
    pub fn record(
        &mut self,
        fingerprint: &str,
        file_name: &str,
        total_pages: usize,
        page: usize,
        scale: f32,
        auto_fit: bool,
    ) {
        self.documents.insert(
            fingerprint.to_string(),
            ViewingSession {
                file_name: file_name.to_string(),
                total_pages,
                page,
                scale,
                auto_fit,
                last_viewed: chrono::Utc::now(),
            },
        );
        if let Err(e) = self.save() {
            log::error!("Failed to save viewing session: {e:#}");
        }
    }

    pub fn remove(&mut self, fingerprint: &str) -> Option<ViewingSession> {
        self.documents.remove(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ViewingSession)> {
        self.documents.iter()
    }
}

//! Session persistence.
//!
//! The store holds one [`WorkflowSession`] per id. There is a single writer
//! per session: the store keeps its own map consistent but does not lock a
//! session across a read-modify-write done by the caller.

use crate::error::{PmError, Result};
use crate::workflow::{WorkflowSession, WorkflowSettings};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// A change applied to a stored session.
pub type SessionMutation = Box<dyn FnOnce(&mut WorkflowSession) + Send>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create and persist a new session.
    async fn create(&self, settings: WorkflowSettings) -> Result<WorkflowSession>;

    /// Fetch a session, `None` if the id is unknown.
    async fn get(&self, session_id: &str) -> Result<Option<WorkflowSession>>;

    /// Apply `mutation` to a stored session and persist the result.
    async fn update(&self, session_id: &str, mutation: SessionMutation) -> Result<WorkflowSession>;

    /// Persist a whole session, replacing what was stored.
    async fn save(&self, session: &WorkflowSession) -> Result<()>;

    /// Ids of all stored sessions.
    async fn list(&self) -> Result<Vec<String>>;
}

fn poisoned<E: std::fmt::Display>(e: E) -> PmError {
    PmError::Internal(format!("session store lock poisoned: {}", e))
}

/// Process-local store.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, WorkflowSession>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, settings: WorkflowSettings) -> Result<WorkflowSession> {
        let session = WorkflowSession::new(settings);
        self.sessions
            .write()
            .map_err(poisoned)?
            .insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> Result<Option<WorkflowSession>> {
        Ok(self.sessions.read().map_err(poisoned)?.get(session_id).cloned())
    }

    async fn update(&self, session_id: &str, mutation: SessionMutation) -> Result<WorkflowSession> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| PmError::SessionNotFound(session_id.to_string()))?;
        mutation(session);
        session.touch();
        Ok(session.clone())
    }

    async fn save(&self, session: &WorkflowSession) -> Result<()> {
        self.sessions
            .write()
            .map_err(poisoned)?
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.sessions.read().map_err(poisoned)?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// One pretty-printed JSON file per session: `<dir>/<session_id>.json`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for a session id. Only uuid ids map to a file.
    fn path_for(&self, session_id: &str) -> Option<PathBuf> {
        uuid::Uuid::parse_str(session_id)
            .ok()
            .map(|id| self.dir.join(format!("{}.json", id.hyphenated())))
    }

    async fn read(&self, path: &Path) -> Result<WorkflowSession> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            PmError::file(path.display().to_string(), format!("Failed to read session: {}", e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            PmError::Serialization(format!(
                "Failed to parse session file '{}': {}. The file may be corrupted.",
                path.display(),
                e
            ))
        })
    }

    async fn write(&self, session: &WorkflowSession) -> Result<()> {
        let path = self.path_for(&session.session_id).ok_or_else(|| {
            PmError::InvalidInput(format!("'{}' is not a valid session id", session.session_id))
        })?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            PmError::file(self.dir.display().to_string(), format!("Failed to create directory: {}", e))
        })?;

        let json = serde_json::to_string_pretty(session)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            PmError::file(tmp.display().to_string(), format!("Failed to write session: {}", e))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            PmError::file(path.display().to_string(), format!("Failed to replace session: {}", e))
        })?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn create(&self, settings: WorkflowSettings) -> Result<WorkflowSession> {
        let session = WorkflowSession::new(settings);
        self.write(&session).await?;
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> Result<Option<WorkflowSession>> {
        let Some(path) = self.path_for(session_id) else {
            return Ok(None);
        };
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        self.read(&path).await.map(Some)
    }

    async fn update(&self, session_id: &str, mutation: SessionMutation) -> Result<WorkflowSession> {
        let mut session = self
            .get(session_id)
            .await?
            .ok_or_else(|| PmError::SessionNotFound(session_id.to_string()))?;
        mutation(&mut session);
        session.touch();
        self.write(&session).await?;
        Ok(session)
    }

    async fn save(&self, session: &WorkflowSession) -> Result<()> {
        self.write(session).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PmError::file(
                    self.dir.display().to_string(),
                    format!("Failed to list sessions: {}", e),
                ));
            }
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if uuid::Uuid::parse_str(stem).is_ok() {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Feedback, FeedbackType};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_create_get_update() {
        let store = InMemorySessionStore::new();
        let session = store.create(WorkflowSettings::new("habit tracker")).await.unwrap();

        let fetched = store.get(&session.session_id).await.unwrap().unwrap();
        assert_eq!(fetched.session_id, session.session_id);

        let updated = store
            .update(
                &session.session_id,
                Box::new(|s| {
                    s.feedback_history
                        .push(Feedback::new(FeedbackType::IdeaRefinement, "add streaks"))
                }),
            )
            .await
            .unwrap();
        assert_eq!(updated.feedback_history.len(), 1);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_update_unknown_session() {
        let store = InMemorySessionStore::new();
        let err = store.update("nope", Box::new(|_| {})).await.unwrap_err();
        assert!(matches!(err, PmError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("sessions"));

        let session = store.create(WorkflowSettings::new("habit tracker")).await.unwrap();
        let path = dir
            .path()
            .join("sessions")
            .join(format!("{}.json", session.session_id));
        assert!(path.exists());

        let loaded = store.get(&session.session_id).await.unwrap().unwrap();
        assert_eq!(loaded, session);
        assert_eq!(store.list().await.unwrap(), vec![session.session_id.clone()]);
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path());
        assert!(store.get("../etc/passwd").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_reports_corruption() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path());
        let session = store.create(WorkflowSettings::new("idea")).await.unwrap();

        let path = dir.path().join(format!("{}.json", session.session_id));
        std::fs::write(&path, "{ not json").unwrap();

        let err = store.get(&session.session_id).await.unwrap_err();
        assert!(matches!(err, PmError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_file_store_list_missing_dir() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("never-created"));
        assert!(store.list().await.unwrap().is_empty());
    }
}

//! Process-local session store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;

use super::{ArtifactKind, SessionId, SessionRecord, SessionStore};

#[derive(Debug)]
struct SessionEntry {
    record: SessionRecord,
    artifacts: Vec<(ArtifactKind, Value)>,
}

/// Keeps sessions in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(
        &self,
        goal: &str,
        notify_target: Option<&str>,
    ) -> Result<SessionId, StoreError> {
        let id = Uuid::new_v4().to_string();
        let record = SessionRecord {
            id: id.clone(),
            goal: goal.to_string(),
            notify_target: notify_target.map(str::to_string),
            created_at: Utc::now(),
        };
        self.sessions.write().await.insert(
            id.clone(),
            SessionEntry {
                record,
                artifacts: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn save_artifact(
        &self,
        session_id: &str,
        kind: ArtifactKind,
        value: Value,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        entry.artifacts.push((kind, value));
        Ok(())
    }

    async fn latest_artifact(
        &self,
        session_id: &str,
        kind: ArtifactKind,
    ) -> Result<Option<Value>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).and_then(|entry| {
            entry
                .artifacts
                .iter()
                .rev()
                .find(|(k, _)| *k == kind)
                .map(|(_, v)| v.clone())
        }))
    }

    async fn artifacts(
        &self,
        session_id: &str,
        kind: ArtifactKind,
    ) -> Result<Vec<Value>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .map(|entry| {
                entry
                    .artifacts
                    .iter()
                    .filter(|(k, _)| *k == kind)
                    .map(|(_, v)| v.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .map(|entry| entry.record.clone()))
    }
}

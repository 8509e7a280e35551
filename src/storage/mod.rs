//! Session persistence.
//!
//! A session is created per pipeline run. Every intermediate artifact (plan,
//! research output, developer output, candidate document, confidence report,
//! outbound action) is appended under the session; nothing is updated in
//! place. The pipeline only reads artifacts back when resuming a session.
//!
//! - [`MemorySessionStore`]: process-local, used when no database path is set
//! - [`SqliteSessionStore`]: sqlx/SQLite file store

pub mod memory;
pub mod sqlite;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

/// Identifier of a stored session.
pub type SessionId = String;

/// Kinds of artifact recorded under a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Plan,
    Research,
    Developer,
    Document,
    ConfidenceReport,
    Action,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 6] = [
        ArtifactKind::Plan,
        ArtifactKind::Research,
        ArtifactKind::Developer,
        ArtifactKind::Document,
        ArtifactKind::ConfidenceReport,
        ArtifactKind::Action,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Plan => "plan",
            ArtifactKind::Research => "research",
            ArtifactKind::Developer => "developer",
            ArtifactKind::Document => "document",
            ArtifactKind::ConfidenceReport => "confidence_report",
            ArtifactKind::Action => "action",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown artifact kind '{}'", s))
    }
}

/// A stored session header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub goal: String,
    pub notify_target: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-only persistence of pipeline sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates a session and returns its id.
    async fn create_session(
        &self,
        goal: &str,
        notify_target: Option<&str>,
    ) -> Result<SessionId, StoreError>;

    /// Appends an artifact. Fails with [`StoreError::SessionNotFound`] for unknown sessions.
    async fn save_artifact(
        &self,
        session_id: &str,
        kind: ArtifactKind,
        value: Value,
    ) -> Result<(), StoreError>;

    /// Most recently appended artifact of `kind`.
    async fn latest_artifact(
        &self,
        session_id: &str,
        kind: ArtifactKind,
    ) -> Result<Option<Value>, StoreError>;

    /// All artifacts of `kind`, oldest first.
    async fn artifacts(&self, session_id: &str, kind: ArtifactKind)
        -> Result<Vec<Value>, StoreError>;

    async fn session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError>;
}

/// Opens the SQLite store at `path`, or an in-memory store when `path` is `None`.
pub async fn open_store(path: Option<&str>) -> Result<Arc<dyn SessionStore>, StoreError> {
    match path {
        Some(path) => Ok(Arc::new(SqliteSessionStore::open(path).await?)),
        None => Ok(Arc::new(MemorySessionStore::new())),
    }
}

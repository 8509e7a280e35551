//! SQLite-backed session store.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::StoreError;

use super::{ArtifactKind, SessionId, SessionRecord, SessionStore};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id              TEXT PRIMARY KEY,
    goal            TEXT NOT NULL,
    notify_target   TEXT,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS artifacts (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id      TEXT NOT NULL REFERENCES sessions(id),
    kind            TEXT NOT NULL,
    value           TEXT NOT NULL,
    created_at      TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_artifacts_session_kind ON artifacts(session_id, kind);
"#;

#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        tracing::info!(path = path, "Session store opened");
        Ok(Self { pool })
    }

    async fn session_exists(&self, session_id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM sessions WHERE id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

fn decode_value(raw: &str) -> Result<Value, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create_session(
        &self,
        goal: &str,
        notify_target: Option<&str>,
    ) -> Result<SessionId, StoreError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO sessions (id, goal, notify_target, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&id)
        .bind(goal)
        .bind(notify_target)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn save_artifact(
        &self,
        session_id: &str,
        kind: ArtifactKind,
        value: Value,
    ) -> Result<(), StoreError> {
        if !self.session_exists(session_id).await? {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }
        sqlx::query("INSERT INTO artifacts (session_id, kind, value) VALUES (?1, ?2, ?3)")
            .bind(session_id)
            .bind(kind.as_str())
            .bind(serde_json::to_string(&value)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn latest_artifact(
        &self,
        session_id: &str,
        kind: ArtifactKind,
    ) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query(
            "SELECT value FROM artifacts WHERE session_id = ?1 AND kind = ?2 ORDER BY id DESC LIMIT 1",
        )
        .bind(session_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| decode_value(r.get::<String, _>("value").as_str()))
            .transpose()
    }

    async fn artifacts(
        &self,
        session_id: &str,
        kind: ArtifactKind,
    ) -> Result<Vec<Value>, StoreError> {
        let rows = sqlx::query(
            "SELECT value FROM artifacts WHERE session_id = ?1 AND kind = ?2 ORDER BY id ASC",
        )
        .bind(session_id)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| decode_value(r.get::<String, _>("value").as_str()))
            .collect()
    }

    async fn session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, goal, notify_target, created_at FROM sessions WHERE id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let created_at: String = r.get("created_at");
            SessionRecord {
                id: r.get("id"),
                goal: r.get("goal"),
                notify_target: r.get("notify_target"),
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_open_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("sessions.db");
        let store = SqliteSessionStore::open(db_path.to_str().unwrap())
            .await
            .unwrap();

        let id = store.create_session("explain tides", None).await.unwrap();
        store
            .save_artifact(&id, ArtifactKind::Plan, json!({"goal": "explain tides", "tasks": []}))
            .await
            .unwrap();
        store
            .save_artifact(&id, ArtifactKind::Research, json!("moon"))
            .await
            .unwrap();
        store
            .save_artifact(&id, ArtifactKind::Research, json!("sun"))
            .await
            .unwrap();

        assert_eq!(
            store
                .latest_artifact(&id, ArtifactKind::Research)
                .await
                .unwrap(),
            Some(json!("sun"))
        );
        assert_eq!(
            store.artifacts(&id, ArtifactKind::Research).await.unwrap(),
            vec![json!("moon"), json!("sun")]
        );
        assert_eq!(
            store.latest_artifact(&id, ArtifactKind::Document).await.unwrap(),
            None
        );

        let record = store.session(&id).await.unwrap().unwrap();
        assert_eq!(record.goal, "explain tides");
        assert_eq!(record.notify_target, None);
    }

    #[tokio::test]
    async fn test_sessions_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("sessions.db");
        let path = db_path.to_str().unwrap();

        let id = {
            let store = SqliteSessionStore::open(path).await.unwrap();
            let id = store
                .create_session("goal", Some("ops@example.com"))
                .await
                .unwrap();
            store
                .save_artifact(&id, ArtifactKind::Document, json!("final"))
                .await
                .unwrap();
            id
        };

        let store = SqliteSessionStore::open(path).await.unwrap();
        let record = store.session(&id).await.unwrap().unwrap();
        assert_eq!(record.notify_target.as_deref(), Some("ops@example.com"));
        assert_eq!(
            store
                .latest_artifact(&id, ArtifactKind::Document)
                .await
                .unwrap(),
            Some(json!("final"))
        );
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("sessions.db");
        let store = SqliteSessionStore::open(db_path.to_str().unwrap())
            .await
            .unwrap();

        assert!(store.session("nope").await.unwrap().is_none());
        let err = store
            .save_artifact("nope", ArtifactKind::Action, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound(_)));
    }
}

//! Embedded-relational [`StateStore`] backed by SQLite via `sqlx`, following the
//! teacher's `DatabaseConnection`/`SqlitePoolOptions` pooling pattern. Schema setup
//! runs on connection rather than via `sqlx::migrate!`, since this store ships no
//! migrations directory of its own.
//!
//! Mirrors the teacher's `runs`/`snapshots`/`history` table layout: `runs` holds the
//! current blob for each live state handle, `snapshots` holds point-in-time captures,
//! `history` holds per-agent diffs with an index on `(agent_id, timestamp)`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use graph_state::{diff_values, StateSchema, WorkflowState};
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::error::{Result, StoreError};
use crate::traits::StateStore;
use crate::types::{compress_state, decompress_state, HistoryEntry, Snapshot, SnapshotId, StateHandle};

/// SQLite-backed `StateStore`.
///
/// # Arguments
/// * `database_url` - SQLite connection string (e.g. `"sqlite:state.db"` or
///   `"sqlite::memory:"`).
#[derive(Clone)]
pub struct SqliteStateStore {
    pool: Arc<SqlitePool>,
}

impl SqliteStateStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with_max_connections(database_url, 5).await
    }

    pub async fn connect_with_max_connections(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let store = Self { pool: Arc::new(pool) };
        store.setup_schema().await?;
        Ok(store)
    }

    async fn setup_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                state_blob BLOB NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                description TEXT,
                blob BLOB NOT NULL,
                size INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                action TEXT NOT NULL,
                diff_blob BLOB NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_history_agent_ts ON history (agent_id, timestamp)")
            .execute(self.pool.as_ref())
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_snapshots_thread_ts ON snapshots (thread_id, created_at)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(self.pool.as_ref()).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn create(&self, initial: Value) -> Result<StateHandle> {
        let handle = StateHandle::new();
        let compressed = compress_state(&initial)?;
        sqlx::query("INSERT INTO runs (id, state_blob, updated_at) VALUES (?, ?, ?)")
            .bind(handle.to_string())
            .bind(compressed)
            .bind(Utc::now().to_rfc3339())
            .execute(self.pool.as_ref())
            .await?;
        Ok(handle)
    }

    async fn read(&self, handle: &StateHandle) -> Result<Value> {
        let row = sqlx::query("SELECT state_blob FROM runs WHERE id = ?")
            .bind(handle.to_string())
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| StoreError::NotFound(handle.to_string()))?;
        let blob: Vec<u8> = row.get("state_blob");
        decompress_state(&blob)
    }

    async fn apply_patch(&self, handle: &StateHandle, patch: &Value) -> Result<Value> {
        let current = self.read(handle).await?;
        let mut state = WorkflowState::new(current, StateSchema::standard());
        state.apply_patch(patch)?;
        let next = state.read().clone();
        let compressed = compress_state(&next)?;

        sqlx::query("UPDATE runs SET state_blob = ?, updated_at = ? WHERE id = ?")
            .bind(compressed)
            .bind(Utc::now().to_rfc3339())
            .bind(handle.to_string())
            .execute(self.pool.as_ref())
            .await?;
        Ok(next)
    }

    async fn snapshot(
        &self,
        handle: &StateHandle,
        workflow_id: &str,
        thread_id: &str,
        description: Option<String>,
    ) -> Result<SnapshotId> {
        let value = self.read(handle).await?;
        let compressed = compress_state(&value)?;
        let id = SnapshotId::new();

        sqlx::query(
            "INSERT INTO snapshots (id, workflow_id, thread_id, created_at, description, blob, size) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(workflow_id)
        .bind(thread_id)
        .bind(Utc::now().to_rfc3339())
        .bind(description)
        .bind(&compressed)
        .bind(compressed.len() as i64)
        .execute(self.pool.as_ref())
        .await?;

        Ok(id)
    }

    async fn restore(&self, snapshot_id: &SnapshotId) -> Result<StateHandle> {
        let snapshot = self
            .get_snapshot(snapshot_id)
            .await?
            .ok_or_else(|| StoreError::SnapshotNotFound(snapshot_id.to_string()))?;
        let value = decompress_state(&snapshot.compressed_state_bytes)?;
        self.create(value).await
    }

    async fn record_change(
        &self,
        agent_id: &str,
        action: &str,
        old: &Value,
        new: &Value,
    ) -> Result<String> {
        let d = diff_values(old, new);
        let entry = HistoryEntry::new(agent_id, action, d, None);
        let diff_blob = bincode::serialize(&entry.state_diff)?;

        sqlx::query(
            "INSERT INTO history (id, agent_id, timestamp, action, diff_blob) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(agent_id)
        .bind(entry.timestamp.to_rfc3339())
        .bind(action)
        .bind(diff_blob)
        .execute(self.pool.as_ref())
        .await?;

        Ok(entry.id)
    }

    async fn history(&self, agent_id: &str, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            "SELECT id, timestamp, action, diff_blob FROM history WHERE agent_id = ? ORDER BY timestamp DESC",
        )
        .bind(agent_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut entries = Vec::new();
        for row in rows {
            let id: String = row.get("id");
            let ts: String = row.get("timestamp");
            let action: String = row.get("action");
            let diff_blob: Vec<u8> = row.get("diff_blob");
            let state_diff = bincode::deserialize(&diff_blob)?;
            let timestamp = DateTime::parse_from_rfc3339(&ts)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StoreError::Storage(e.to_string()))?;

            entries.push(HistoryEntry {
                id,
                agent_id: agent_id.to_string(),
                timestamp,
                action,
                state_diff,
                previous_snapshot_id: None,
            });

            if let Some(limit) = limit {
                if entries.len() >= limit {
                    break;
                }
            }
        }
        Ok(entries)
    }

    async fn replay(
        &self,
        agent_id: &str,
        base: &Value,
        until_ts: Option<DateTime<Utc>>,
    ) -> Result<Value> {
        let mut entries = self.history(agent_id, None).await?;
        entries.reverse();

        let mut current = base.clone();
        for entry in &entries {
            if let Some(cutoff) = until_ts {
                if entry.timestamp > cutoff {
                    break;
                }
            }
            current = graph_state::apply_diff(&current, &entry.state_diff).map_err(|_| {
                StoreError::HistoryError {
                    entry_id: entry.id.clone(),
                }
            })?;
        }
        Ok(current)
    }

    async fn get_snapshot(&self, snapshot_id: &SnapshotId) -> Result<Option<Snapshot>> {
        let row = sqlx::query(
            "SELECT id, workflow_id, thread_id, created_at, description, blob FROM snapshots WHERE id = ?",
        )
        .bind(snapshot_id.to_string())
        .fetch_optional(self.pool.as_ref())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let created_at: String = row.get("created_at");
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        Ok(Some(Snapshot {
            id: SnapshotId(row.get("id")),
            workflow_id: row.get("workflow_id"),
            thread_id: row.get("thread_id"),
            created_at,
            description: row.get("description"),
            compressed_state_bytes: row.get("blob"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> SqliteStateStore {
        SqliteStateStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn create_read_and_patch_persist_through_sqlite() {
        let store = store().await;
        let handle = store.create(json!({"messages": []})).await.unwrap();
        let next = store.apply_patch(&handle, &json!({"messages": ["hi"]})).await.unwrap();
        assert_eq!(next["messages"], json!(["hi"]));
        assert_eq!(store.read(&handle).await.unwrap(), next);
    }

    #[tokio::test]
    async fn snapshot_and_restore_round_trip() {
        let store = store().await;
        let handle = store.create(json!({"a": 1})).await.unwrap();
        let snapshot_id = store
            .snapshot(&handle, "wf-1", "thread-1", None)
            .await
            .unwrap();
        let restored = store.restore(&snapshot_id).await.unwrap();
        assert_eq!(store.read(&restored).await.unwrap(), json!({"a": 1}));
    }

    #[tokio::test]
    async fn history_orders_most_recent_first() {
        let store = store().await;
        store
            .record_change("agent-1", "node:a", &json!({"n": 0}), &json!({"n": 1}))
            .await
            .unwrap();
        store
            .record_change("agent-1", "node:b", &json!({"n": 1}), &json!({"n": 2}))
            .await
            .unwrap();

        let entries = store.history("agent-1", None).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "node:b");
    }

    #[tokio::test]
    async fn replay_reconstructs_state() {
        let store = store().await;
        let s0 = json!({"messages": []});
        let s1 = json!({"messages": ["a"]});
        store.record_change("agent-1", "node:a", &s0, &s1).await.unwrap();

        let replayed = store.replay("agent-1", &s0, None).await.unwrap();
        assert_eq!(replayed, s1);
    }
}

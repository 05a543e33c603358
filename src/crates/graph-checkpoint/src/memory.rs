//! In-memory [`StateStore`] backed by `Arc<RwLock<HashMap<..>>>`. No persistence
//! across process restarts; suitable for development, tests, and short-lived runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use graph_state::{diff_values, WorkflowState};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::traits::StateStore;
use crate::types::{compress_state, decompress_state, HistoryEntry, Snapshot, SnapshotId, StateHandle};

type StateMap = Arc<RwLock<HashMap<StateHandle, WorkflowState>>>;
type SnapshotMap = Arc<RwLock<HashMap<SnapshotId, Snapshot>>>;
type HistoryMap = Arc<RwLock<HashMap<String, Vec<HistoryEntry>>>>;

/// In-memory `StateStore`. Optionally caps history entries per agent, evicting the
/// oldest (FIFO) once the cap is exceeded.
#[derive(Debug, Clone)]
pub struct InMemoryStateStore {
    states: StateMap,
    snapshots: SnapshotMap,
    history: HistoryMap,
    history_cap_per_agent: Option<usize>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            snapshots: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(HashMap::new())),
            history_cap_per_agent: None,
        }
    }

    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history_cap_per_agent = Some(cap);
        self
    }

    /// Number of live state handles currently tracked (useful for tests).
    pub async fn live_state_count(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn clear(&self) {
        self.states.write().await.clear();
        self.snapshots.write().await.clear();
        self.history.write().await.clear();
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn create(&self, initial: Value) -> Result<StateHandle> {
        let handle = StateHandle::new();
        let state = WorkflowState::with_standard_schema(initial);
        self.states.write().await.insert(handle.clone(), state);
        Ok(handle)
    }

    async fn read(&self, handle: &StateHandle) -> Result<Value> {
        let states = self.states.read().await;
        let state = states
            .get(handle)
            .ok_or_else(|| StoreError::NotFound(handle.to_string()))?;
        Ok(state.read().clone())
    }

    async fn apply_patch(&self, handle: &StateHandle, patch: &Value) -> Result<Value> {
        let mut states = self.states.write().await;
        let state = states
            .get_mut(handle)
            .ok_or_else(|| StoreError::NotFound(handle.to_string()))?;
        state.apply_patch(patch)?;
        Ok(state.read().clone())
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

        let snapshot = Snapshot {
            id: SnapshotId::new(),
            workflow_id: workflow_id.to_string(),
            thread_id: thread_id.to_string(),
            created_at: Utc::now(),
            description,
            compressed_state_bytes: compressed,
        };
        let id = snapshot.id.clone();
        self.snapshots.write().await.insert(id.clone(), snapshot);
        Ok(id)
    }

    async fn restore(&self, snapshot_id: &SnapshotId) -> Result<StateHandle> {
        let snapshots = self.snapshots.read().await;
        let snapshot = snapshots
            .get(snapshot_id)
            .ok_or_else(|| StoreError::SnapshotNotFound(snapshot_id.to_string()))?;
        let value = decompress_state(&snapshot.compressed_state_bytes)?;
        drop(snapshots);
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
        let entry_id = entry.id.clone();

        let mut history = self.history.write().await;
        let entries = history.entry(agent_id.to_string()).or_default();
        entries.push(entry);
        if let Some(cap) = self.history_cap_per_agent {
            while entries.len() > cap {
                entries.remove(0);
            }
        }
        Ok(entry_id)
    }

    async fn history(&self, agent_id: &str, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        let history = self.history.read().await;
        let mut entries: Vec<HistoryEntry> = history
            .get(agent_id)
            .map(|e| e.clone())
            .unwrap_or_default();
        entries.reverse();
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    async fn replay(
        &self,
        agent_id: &str,
        base: &Value,
        until_ts: Option<DateTime<Utc>>,
    ) -> Result<Value> {
        let history = self.history.read().await;
        let entries = history.get(agent_id).cloned().unwrap_or_default();

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
        Ok(self.snapshots.read().await.get(snapshot_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_read_and_patch_round_trip() {
        let store = InMemoryStateStore::new();
        let handle = store.create(json!({"messages": []})).await.unwrap();
        let new_state = store
            .apply_patch(&handle, &json!({"messages": ["hi"]}))
            .await
            .unwrap();
        assert_eq!(new_state["messages"], json!(["hi"]));
        assert_eq!(store.read(&handle).await.unwrap(), new_state);
    }

    #[tokio::test]
    async fn snapshot_and_restore_reproduces_state() {
        let store = InMemoryStateStore::new();
        let handle = store.create(json!({"a": 1})).await.unwrap();
        store.apply_patch(&handle, &json!({"a": 2})).await.unwrap();

        let snapshot_id = store
            .snapshot(&handle, "wf-1", "thread-1", Some("checkpoint".to_string()))
            .await
            .unwrap();
        let restored_handle = store.restore(&snapshot_id).await.unwrap();
        assert_eq!(store.read(&restored_handle).await.unwrap()["a"], json!(2));
    }

    #[tokio::test]
    async fn record_change_and_history_round_trip() {
        let store = InMemoryStateStore::new();
        let old = json!({"messages": []});
        let new = json!({"messages": ["hi"]});
        store.record_change("agent-1", "node:start", &old, &new).await.unwrap();

        let entries = store.history("agent-1", None).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "node:start");
    }

    #[tokio::test]
    async fn replay_reconstructs_state_from_recorded_diffs() {
        let store = InMemoryStateStore::new();
        let s0 = json!({"messages": []});
        let s1 = json!({"messages": ["a"]});
        let s2 = json!({"messages": ["a", "b"]});
        store.record_change("agent-1", "node:a", &s0, &s1).await.unwrap();
        store.record_change("agent-1", "node:b", &s1, &s2).await.unwrap();

        let replayed = store.replay("agent-1", &s0, None).await.unwrap();
        assert_eq!(replayed, s2);
    }

    #[tokio::test]
    async fn history_cap_evicts_oldest_entries() {
        let store = InMemoryStateStore::new().with_history_cap(2);
        for i in 0..5 {
            let old = json!({"n": i});
            let new = json!({"n": i + 1});
            store.record_change("agent-1", "step", &old, &new).await.unwrap();
        }
        let entries = store.history("agent-1", None).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn unknown_handle_is_not_found() {
        let store = InMemoryStateStore::new();
        let err = store.read(&StateHandle("missing".to_string())).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}

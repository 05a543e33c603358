//! The [`StateStore`] contract (§4.1): create/read/patch live state, snapshot and
//! restore it, and record/replay per-agent history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::types::{HistoryEntry, Snapshot, SnapshotId, StateHandle};

/// Owns live workflow state and its persisted snapshots/history.
///
/// Implementations must keep snapshots for a thread totally ordered by `created_at`
/// and guarantee that replaying an agent's recorded diffs from a base state
/// reconstructs the same state the engine would have reached by applying patches
/// directly.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Creates a new live state handle seeded with `initial`.
    async fn create(&self, initial: Value) -> Result<StateHandle>;

    /// Reads the current value of a live state.
    async fn read(&self, handle: &StateHandle) -> Result<Value>;

    /// Applies a patch through the handle's reducer schema, returning the new state.
    async fn apply_patch(&self, handle: &StateHandle, patch: &Value) -> Result<Value>;

    /// Persists a point-in-time snapshot of a live state, returning its id.
    async fn snapshot(
        &self,
        handle: &StateHandle,
        workflow_id: &str,
        thread_id: &str,
        description: Option<String>,
    ) -> Result<SnapshotId>;

    /// Restores a new live state handle from a previously persisted snapshot.
    async fn restore(&self, snapshot_id: &SnapshotId) -> Result<StateHandle>;

    /// Records a state transition for `agent_id` as the diff from `old` to `new`.
    async fn record_change(
        &self,
        agent_id: &str,
        action: &str,
        old: &Value,
        new: &Value,
    ) -> Result<String>;

    /// Lists history entries for an agent, most recent first, optionally capped.
    async fn history(&self, agent_id: &str, limit: Option<usize>) -> Result<Vec<HistoryEntry>>;

    /// Replays recorded diffs for `agent_id` onto `base`, in chronological order, up
    /// to (and including) `until_ts` if given, else through the latest entry.
    async fn replay(
        &self,
        agent_id: &str,
        base: &Value,
        until_ts: Option<DateTime<Utc>>,
    ) -> Result<Value>;

    /// Fetches a persisted snapshot by id, if present.
    async fn get_snapshot(&self, snapshot_id: &SnapshotId) -> Result<Option<Snapshot>>;
}

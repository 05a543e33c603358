//! Snapshot and history entry types persisted by a [`crate::StateStore`].

use chrono::{DateTime, Utc};
use graph_state::ValueDiff;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Opaque handle to a live, in-memory workflow state tracked by a [`crate::StateStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateHandle(pub String);

impl StateHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a persisted [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub String);

impl SnapshotId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point-in-time capture of a workflow's state, identified within its thread.
///
/// Snapshots within a thread are totally ordered by `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub workflow_id: String,
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
    pub description: Option<String>,
    /// bincode-encoded, deflate-compressed state value.
    pub compressed_state_bytes: Vec<u8>,
}

/// One recorded state transition for an agent, as a diff from the previous state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub state_diff: ValueDiff,
    pub previous_snapshot_id: Option<SnapshotId>,
}

impl HistoryEntry {
    pub fn new(
        agent_id: impl Into<String>,
        action: impl Into<String>,
        state_diff: ValueDiff,
        previous_snapshot_id: Option<SnapshotId>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
            action: action.into(),
            state_diff,
            previous_snapshot_id,
        }
    }
}

/// Compresses a JSON value to bincode-encoded, deflate-compressed bytes for storage.
pub fn compress_state(value: &Value) -> crate::error::Result<Vec<u8>> {
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;

    let encoded = bincode::serialize(value)?;
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&encoded)?;
    Ok(encoder.finish()?)
}

/// Inverse of [`compress_state`].
pub fn decompress_state(bytes: &[u8]) -> crate::error::Result<Value> {
    use flate2::read::DeflateDecoder;
    use std::io::Read;

    let mut decoder = DeflateDecoder::new(bytes);
    let mut decoded = Vec::new();
    decoder.read_to_end(&mut decoded)?;
    Ok(bincode::deserialize(&decoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compress_then_decompress_round_trips() {
        let value = json!({"messages": ["a", "b"], "iteration_count": 3});
        let bytes = compress_state(&value).unwrap();
        let restored = decompress_state(&bytes).unwrap();
        assert_eq!(restored, value);
    }

    #[test]
    fn state_handle_display_matches_inner() {
        let h = StateHandle("abc".to_string());
        assert_eq!(h.to_string(), "abc");
    }
}

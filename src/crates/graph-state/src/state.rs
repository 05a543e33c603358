//! Live workflow state: the in-memory value an [`ExecutionEngine`] mutates through
//! node patches.
//!
//! State is immutable at rest — each node produces a patch, and [`WorkflowState`]
//! applies it through the governing [`StateSchema`], returning the [`ValueDiff`]
//! between pre- and post-patch state so the caller can record a history entry.
//!
//! [`ExecutionEngine`]: https://docs.rs/graph-core (execution engine, a downstream crate)

use serde_json::Value;

use crate::diff::{diff, ValueDiff};
use crate::error::Result;
use crate::reducer::StateSchema;

/// Typed workflow state with a reducer schema governing how patches merge.
#[derive(Debug)]
pub struct WorkflowState {
    schema: StateSchema,
    value: Value,
}

impl WorkflowState {
    /// Creates state from an initial value under the given schema.
    pub fn new(initial: Value, schema: StateSchema) -> Self {
        Self { schema, value: initial }
    }

    /// Creates state from an initial value under the standard schema (§3).
    pub fn with_standard_schema(initial: Value) -> Self {
        Self::new(initial, StateSchema::standard())
    }

    /// A read-only view of the current state.
    pub fn read(&self) -> &Value {
        &self.value
    }

    /// Applies a patch key-by-key through the schema's reducers, returning the diff
    /// from the pre-patch state to the post-patch state.
    pub fn apply_patch(&mut self, patch: &Value) -> Result<ValueDiff> {
        let before = self.value.clone();
        self.schema.apply(&mut self.value, patch)?;
        Ok(diff(&before, &self.value))
    }

    /// Replaces the state wholesale, e.g. when restoring from a snapshot.
    pub fn restore(&mut self, value: Value) {
        self.value = value;
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn apply_patch_merges_through_schema_and_returns_diff() {
        let mut state = WorkflowState::with_standard_schema(json!({"messages": []}));
        let d = state
            .apply_patch(&json!({"messages": ["hello"], "iteration_count": 1}))
            .unwrap();

        assert_eq!(state.read()["messages"], json!(["hello"]));
        assert_eq!(state.read()["iteration_count"], json!(1));
        assert_ne!(d, ValueDiff::Unchanged);
    }

    #[test]
    fn repeated_append_patches_preserve_order() {
        let mut state = WorkflowState::with_standard_schema(json!({"messages": []}));
        state.apply_patch(&json!({"messages": ["a"]})).unwrap();
        state.apply_patch(&json!({"messages": ["b"]})).unwrap();
        assert_eq!(state.read()["messages"], json!(["a", "b"]));
    }

    #[test]
    fn restore_replaces_state_wholesale() {
        let mut state = WorkflowState::with_standard_schema(json!({"a": 1}));
        state.restore(json!({"a": 99}));
        assert_eq!(state.read()["a"], json!(99));
    }
}

//! Reducer semantics for merging node-produced patches into workflow state.
//!
//! A [`Reducer`] combines an existing value for a key with an incoming patch value.
//! A [`StateSchema`] maps keys to reducers, falling back to a default reducer
//! (overwrite, unless configured otherwise) for keys it does not declare.

use crate::error::{Result, StateError};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Combines a current value with an update, producing the next value.
pub trait Reducer: Send + Sync {
    fn reduce(&self, key: &str, current: &Value, update: &Value) -> Result<Value>;
    fn name(&self) -> &str;
}

impl fmt::Debug for dyn Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reducer({})", self.name())
    }
}

/// Last write wins: the update replaces the current value outright.
#[derive(Debug, Default)]
pub struct OverwriteReducer;

impl Reducer for OverwriteReducer {
    fn reduce(&self, _key: &str, _current: &Value, update: &Value) -> Result<Value> {
        Ok(update.clone())
    }

    fn name(&self) -> &str {
        "overwrite"
    }
}

/// Concatenates lists (or promotes a bare scalar/null into one), preserving order
/// and keeping duplicates.
///
/// Items that carry a `tool_call_id` field (the `tool_calls`/`tool_results` keys,
/// §3) are checked against every id already in the list: a node re-emitting a
/// `tool_call_id` that's already present is logged via `tracing::warn!` and the
/// duplicate is pushed with a `_duplicate_of_tool_call_id` marker rather than
/// silently dropped or rejected — the spec's "keep duplicates, surface a warning"
/// decision.
#[derive(Debug, Default)]
pub struct AppendReducer;

impl AppendReducer {
    fn tool_call_id(item: &Value) -> Option<&str> {
        item.as_object()?.get("tool_call_id")?.as_str()
    }

    /// Appends `item` to `combined`, annotating it if its `tool_call_id` (if any)
    /// already occurs earlier in `combined`.
    fn push_annotated(key: &str, combined: &mut Vec<Value>, item: Value) {
        let Some(id) = Self::tool_call_id(&item) else {
            combined.push(item);
            return;
        };
        let id = id.to_string();
        let is_duplicate = combined.iter().filter_map(Self::tool_call_id).any(|existing| existing == id);
        if !is_duplicate {
            combined.push(item);
            return;
        }

        tracing::warn!(key, tool_call_id = %id, "append reducer saw a duplicate tool_call_id; keeping both entries");
        let mut annotated = item;
        if let Some(obj) = annotated.as_object_mut() {
            obj.insert("_duplicate_of_tool_call_id".to_string(), Value::String(id));
        }
        combined.push(annotated);
    }
}

impl Reducer for AppendReducer {
    fn reduce(&self, key: &str, current: &Value, update: &Value) -> Result<Value> {
        let mut combined = match current {
            Value::Null => Vec::new(),
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        };

        match update {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.clone() {
                    Self::push_annotated(key, &mut combined, item);
                }
            }
            other => Self::push_annotated(key, &mut combined, other.clone()),
        }

        Ok(Value::Array(combined))
    }

    fn name(&self) -> &str {
        "append"
    }
}

/// Recursive map merge: scalar collisions let the update win, list collisions are
/// appended, nested object collisions merge recursively.
#[derive(Debug, Default)]
pub struct MergeReducer;

impl MergeReducer {
    fn merge_values(current: &Value, update: &Value) -> Value {
        match (current, update) {
            (Value::Object(a), Value::Object(b)) => {
                let mut merged = a.clone();
                for (k, v) in b {
                    let next = match merged.get(k) {
                        Some(existing) => Self::merge_values(existing, v),
                        None => v.clone(),
                    };
                    merged.insert(k.clone(), next);
                }
                Value::Object(merged)
            }
            (Value::Array(a), Value::Array(b)) => {
                let mut combined = a.clone();
                combined.extend(b.clone());
                Value::Array(combined)
            }
            (_, update) => update.clone(),
        }
    }
}

impl Reducer for MergeReducer {
    fn reduce(&self, _key: &str, current: &Value, update: &Value) -> Result<Value> {
        Ok(Self::merge_values(current, update))
    }

    fn name(&self) -> &str {
        "merge"
    }
}

/// Maps state keys to the reducer that governs them, with an optional fallback for
/// keys the schema does not declare (user-declared fields default to overwrite).
pub struct StateSchema {
    fields: HashMap<String, Box<dyn Reducer>>,
    default_reducer: Box<dyn Reducer>,
}

impl fmt::Debug for StateSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSchema")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for StateSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl StateSchema {
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
            default_reducer: Box::new(OverwriteReducer),
        }
    }

    /// The schema used for standard workflow-state keys (§3 of the spec):
    /// messages/tool_calls/tool_results append, iteration_count/output overwrite,
    /// metadata merges, errors append.
    pub fn standard() -> Self {
        Self::new()
            .with_field("messages", AppendReducer)
            .with_field("tool_calls", AppendReducer)
            .with_field("tool_results", AppendReducer)
            .with_field("iteration_count", OverwriteReducer)
            .with_field("errors", AppendReducer)
            .with_field("metadata", MergeReducer)
            .with_field("output", OverwriteReducer)
    }

    pub fn with_field(mut self, key: impl Into<String>, reducer: impl Reducer + 'static) -> Self {
        self.fields.insert(key.into(), Box::new(reducer));
        self
    }

    pub fn add_field(&mut self, key: impl Into<String>, reducer: impl Reducer + 'static) {
        self.fields.insert(key.into(), Box::new(reducer));
    }

    pub fn with_default_reducer(mut self, reducer: impl Reducer + 'static) -> Self {
        self.default_reducer = Box::new(reducer);
        self
    }

    pub fn get_reducer(&self, key: &str) -> &dyn Reducer {
        self.fields
            .get(key)
            .map(|r| r.as_ref())
            .unwrap_or(self.default_reducer.as_ref())
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|s| s.as_str())
    }

    /// Applies every key present in `update` to `state`, mutating it in place
    /// according to this schema's reducers.
    pub fn apply(&self, state: &mut Value, update: &Value) -> Result<()> {
        let update_obj = update.as_object().ok_or_else(|| StateError::InvalidPatch {
            key: String::new(),
            reason: "patch must be a JSON object".to_string(),
        })?;

        if !state.is_object() {
            *state = Value::Object(serde_json::Map::new());
        }
        let state_obj = state.as_object_mut().expect("state coerced to object above");

        for (key, patch_value) in update_obj {
            let reducer = self.get_reducer(key);
            let current = state_obj.get(key).cloned().unwrap_or(Value::Null);
            let next = reducer.reduce(key, &current, patch_value).map_err(|e| match e {
                StateError::ReducerMismatch { reducer, reason, .. } => StateError::ReducerMismatch {
                    key: key.clone(),
                    reducer,
                    reason,
                },
                other => other,
            })?;
            state_obj.insert(key.clone(), next);
        }

        Ok(())
    }
}

//! Structural diffing of workflow state, used to build history entries that can be
//! replayed to reconstruct a later state from an earlier one.
//!
//! Maps record added/removed/changed keys with before/after values; lists record a
//! positional delta rather than a full LCS edit script, which is sufficient for the
//! append-heavy lists (`messages`, `tool_calls`, ...) this system actually produces.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Result, StateError};

/// One element of a positional list delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ListOp {
    Insert { index: usize, value: Value },
    Remove { index: usize, value: Value },
    Replace { index: usize, before: Value, after: Value },
}

/// A diff between two JSON values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueDiff {
    Unchanged,
    Scalar { before: Value, after: Value },
    Map {
        added: BTreeMap<String, Value>,
        removed: BTreeMap<String, Value>,
        changed: BTreeMap<String, ValueDiff>,
    },
    List { ops: Vec<ListOp> },
}

/// Computes the minimal edit script that reconstructs `new` from `old`.
pub fn diff(old: &Value, new: &Value) -> ValueDiff {
    if old == new {
        return ValueDiff::Unchanged;
    }

    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            let mut added = BTreeMap::new();
            let mut removed = BTreeMap::new();
            let mut changed = BTreeMap::new();

            for (key, new_value) in new_map {
                match old_map.get(key) {
                    None => {
                        added.insert(key.clone(), new_value.clone());
                    }
                    Some(old_value) => {
                        let d = diff(old_value, new_value);
                        if d != ValueDiff::Unchanged {
                            changed.insert(key.clone(), d);
                        }
                    }
                }
            }
            for (key, old_value) in old_map {
                if !new_map.contains_key(key) {
                    removed.insert(key.clone(), old_value.clone());
                }
            }

            ValueDiff::Map { added, removed, changed }
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            let mut ops = Vec::new();
            let common = old_items.len().min(new_items.len());

            for i in 0..common {
                if old_items[i] != new_items[i] {
                    ops.push(ListOp::Replace {
                        index: i,
                        before: old_items[i].clone(),
                        after: new_items[i].clone(),
                    });
                }
            }
            for (i, item) in new_items.iter().enumerate().skip(common) {
                ops.push(ListOp::Insert { index: i, value: item.clone() });
            }
            for (i, item) in old_items.iter().enumerate().skip(common).rev() {
                ops.push(ListOp::Remove { index: i, value: item.clone() });
            }

            ValueDiff::List { ops }
        }
        _ => ValueDiff::Scalar {
            before: old.clone(),
            after: new.clone(),
        },
    }
}

/// Reconstructs the post-diff value from a pre-diff value. Inverse of [`diff`].
pub fn apply(old: &Value, d: &ValueDiff) -> Result<Value> {
    match d {
        ValueDiff::Unchanged => Ok(old.clone()),
        ValueDiff::Scalar { after, .. } => Ok(after.clone()),
        ValueDiff::Map { added, removed, changed } => {
            let mut map = old
                .as_object()
                .ok_or_else(|| StateError::DiffReplay {
                    key: String::new(),
                    reason: "expected object to apply map diff".to_string(),
                })?
                .clone();

            for key in removed.keys() {
                map.remove(key);
            }
            for (key, sub_diff) in changed {
                let current = map.get(key).cloned().unwrap_or(Value::Null);
                let next = apply(&current, sub_diff).map_err(|_| StateError::DiffReplay {
                    key: key.clone(),
                    reason: "nested diff replay failed".to_string(),
                })?;
                map.insert(key.clone(), next);
            }
            for (key, value) in added {
                map.insert(key.clone(), value.clone());
            }

            Ok(Value::Object(map))
        }
        ValueDiff::List { ops } => {
            let mut items = old
                .as_array()
                .ok_or_else(|| StateError::DiffReplay {
                    key: String::new(),
                    reason: "expected array to apply list diff".to_string(),
                })?
                .clone();

            // Removes are recorded highest-index-first so truncating from the tail
            // is safe without shifting earlier indices.
            for op in ops {
                match op {
                    ListOp::Replace { index, after, .. } => {
                        if let Some(slot) = items.get_mut(*index) {
                            *slot = after.clone();
                        }
                    }
                    ListOp::Insert { index, value } => {
                        if *index == items.len() {
                            items.push(value.clone());
                        } else if *index < items.len() {
                            items.insert(*index, value.clone());
                        }
                    }
                    ListOp::Remove { index, .. } => {
                        if *index < items.len() {
                            items.remove(*index);
                        }
                    }
                }
            }

            Ok(Value::Array(items))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unchanged_values_produce_unchanged_diff() {
        assert_eq!(diff(&json!({"a": 1}), &json!({"a": 1})), ValueDiff::Unchanged);
    }

    #[test]
    fn map_diff_tracks_added_removed_changed() {
        let old = json!({"a": 1, "b": 2});
        let new = json!({"b": 3, "c": 4});
        let d = diff(&old, &new);
        match d {
            ValueDiff::Map { added, removed, changed } => {
                assert_eq!(added.get("c"), Some(&json!(4)));
                assert_eq!(removed.get("a"), Some(&json!(1)));
                assert!(changed.contains_key("b"));
            }
            _ => panic!("expected map diff"),
        }
    }

    #[test]
    fn list_diff_records_positional_ops() {
        let old = json!(["a", "b"]);
        let new = json!(["a", "x", "c"]);
        let d = diff(&old, &new);
        match &d {
            ValueDiff::List { ops } => {
                assert!(ops.iter().any(|op| matches!(op, ListOp::Replace { index: 1, .. })));
                assert!(ops.iter().any(|op| matches!(op, ListOp::Insert { index: 2, .. })));
            }
            _ => panic!("expected list diff"),
        }
    }

    #[test]
    fn apply_reconstructs_new_from_old_for_maps() {
        let old = json!({"a": 1, "b": {"x": 1}});
        let new = json!({"b": {"x": 2, "y": 3}, "c": "new"});
        let d = diff(&old, &new);
        let reconstructed = apply(&old, &d).unwrap();
        assert_eq!(reconstructed, new);
    }

    #[test]
    fn apply_reconstructs_new_from_old_for_lists() {
        let old = json!(["a", "b", "c"]);
        let new = json!(["a", "z"]);
        let d = diff(&old, &new);
        let reconstructed = apply(&old, &d).unwrap();
        assert_eq!(reconstructed, new);
    }

    #[test]
    fn apply_on_unchanged_returns_old() {
        let old = json!({"k": "v"});
        let reconstructed = apply(&old, &ValueDiff::Unchanged).unwrap();
        assert_eq!(reconstructed, old);
    }
}

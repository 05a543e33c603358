//! Typed workflow state for graph-core: reducer-merged patches, structural diffing,
//! and the chat message / tool call / tool result types nodes exchange.
//!
//! # Modules
//!
//! - `reducer` - Reducer trait and the overwrite/append/merge built-ins, plus
//!   [`StateSchema`] for mapping state keys to their governing reducer.
//! - `diff` - Structural diffing between state snapshots, used to build replayable
//!   history entries.
//! - `message` - [`Message`], [`ToolCall`], [`ToolResult`].
//! - `state` - [`WorkflowState`], the live value an execution engine mutates.

pub mod diff;
pub mod error;
pub mod message;
pub mod reducer;
pub mod state;

pub use diff::{diff as diff_values, apply as apply_diff, ListOp, ValueDiff};
pub use error::{Result, StateError};
pub use message::{Message, MessageRole, ToolCall, ToolResult};
pub use reducer::{AppendReducer, MergeReducer, OverwriteReducer, Reducer, StateSchema};
pub use state::WorkflowState;

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            ".*".prop_map(Value::from),
        ]
    }

    proptest! {
        #[test]
        fn append_preserves_order_for_arbitrary_scalars(
            a in prop::collection::vec(arb_scalar(), 0..5),
            b in prop::collection::vec(arb_scalar(), 0..5),
        ) {
            let reducer = AppendReducer;
            let result = reducer
                .reduce("k", &Value::Array(a.clone()), &Value::Array(b.clone()))
                .unwrap();
            let expected: Vec<Value> = a.into_iter().chain(b).collect();
            prop_assert_eq!(result, Value::Array(expected));
        }

        #[test]
        fn overwrite_is_idempotent_on_equal_values(v in arb_scalar()) {
            let reducer = OverwriteReducer;
            let once = reducer.reduce("k", &json!(null), &v).unwrap();
            let twice = reducer.reduce("k", &once, &v).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}

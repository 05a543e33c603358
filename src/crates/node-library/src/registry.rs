//! Registers the seven built-in node kinds under the names a workflow spec's
//! `kind` field refers to, grounded on the teacher's `StateGraph` pattern of
//! mapping a node id to a boxed executor at compile time — here the mapping is by
//! kind name instead, since node instances are built per-spec from declared config.

use std::sync::Arc;

use graph_core::{Node, NodeRegistry};

use crate::nodes::{AnalysisNode, ConditionNode, EndNode, LlmNode, StartNode, ToolNode, WaitNode};

/// Populates `registry` with the standard `start`/`end`/`llm`/`tool`/`analysis`/
/// `condition`/`wait` node kinds.
pub fn register_standard_nodes(registry: &mut NodeRegistry) {
    use serde_json::Value;

    registry.register("start", Arc::new(|_cfg: &Value| Ok(Arc::new(StartNode) as Arc<dyn Node>)));
    registry.register("end", Arc::new(|_cfg: &Value| Ok(Arc::new(EndNode) as Arc<dyn Node>)));
    registry.register("llm", Arc::new(|cfg: &Value| Ok(Arc::new(LlmNode::from_value(cfg)?) as Arc<dyn Node>)));
    registry.register("tool", Arc::new(|cfg: &Value| Ok(Arc::new(ToolNode::from_value(cfg)?) as Arc<dyn Node>)));
    registry.register(
        "analysis",
        Arc::new(|cfg: &Value| Ok(Arc::new(AnalysisNode::from_value(cfg)?) as Arc<dyn Node>)),
    );
    registry.register(
        "condition",
        Arc::new(|cfg: &Value| Ok(Arc::new(ConditionNode::from_value(cfg)?) as Arc<dyn Node>)),
    );
    registry.register("wait", Arc::new(|cfg: &Value| Ok(Arc::new(WaitNode::from_value(cfg)?) as Arc<dyn Node>)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registers_all_seven_standard_kinds() {
        let mut registry = NodeRegistry::new();
        register_standard_nodes(&mut registry);

        assert!(registry.instantiate("start", &json!({})).is_ok());
        assert!(registry.instantiate("end", &json!({})).is_ok());
        assert!(registry
            .instantiate("llm", &json!({"selector": "plan.echelon1"}))
            .is_ok());
        assert!(registry.instantiate("tool", &json!({})).is_ok());
        assert!(registry
            .instantiate("analysis", &json!({"selector": "plan.echelon1", "output_key": "verdict"}))
            .is_ok());
        assert!(registry
            .instantiate(
                "condition",
                &json!({"predicate": {"op": "exists", "path": "x"}, "when_true": "a", "when_false": "b"})
            )
            .is_ok());
        assert!(registry.instantiate("wait", &json!({"duration_ms": 10})).is_ok());
    }
}

//! The node execution contract (§4.4) and the collaborator handles injected into
//! every node: an `LlmCaller` and a `ToolCaller`, kept as trait objects here so
//! `graph-core` never depends on the concrete `llm-scheduler`/`tool-runtime` crates
//! that implement them — those are wired together by `agent-runtime`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::graph::NodeId;

/// What a node returns: the patch to merge into workflow state, and an optional
/// override of the next node id (used by `condition` nodes).
#[derive(Debug, Clone)]
pub struct NodeOutcome {
    pub patch: Value,
    pub next_override: Option<NodeId>,
}

impl NodeOutcome {
    pub fn patch(patch: Value) -> Self {
        Self { patch, next_override: None }
    }

    pub fn with_override(patch: Value, next: impl Into<NodeId>) -> Self {
        Self { patch, next_override: Some(next.into()) }
    }
}

#[async_trait]
pub trait LlmCaller: Send + Sync {
    async fn invoke(&self, selector: &str, request: Value, cancel: &CancelToken) -> Result<Value>;
}

#[async_trait]
pub trait ToolCaller: Send + Sync {
    async fn invoke(&self, name: &str, args: Value, cancel: &CancelToken) -> Result<Value>;

    async fn invoke_many(
        &self,
        calls: Vec<(String, Value)>,
        cancel: &CancelToken,
        max_parallel: usize,
    ) -> Result<Vec<Value>>;
}

/// Collaborators available to a node during execution. Either handle may be absent
/// for node kinds that don't need it (e.g. `start`/`end`/`condition`/`wait`).
#[derive(Clone)]
pub struct NodeDeps {
    pub llm: Option<Arc<dyn LlmCaller>>,
    pub tools: Option<Arc<dyn ToolCaller>>,
}

impl NodeDeps {
    pub fn none() -> Self {
        Self { llm: None, tools: None }
    }

    pub fn with_llm(llm: Arc<dyn LlmCaller>) -> Self {
        Self { llm: Some(llm), tools: None }
    }

    pub fn with_tools(tools: Arc<dyn ToolCaller>) -> Self {
        Self { llm: None, tools: Some(tools) }
    }

    pub fn full(llm: Arc<dyn LlmCaller>, tools: Arc<dyn ToolCaller>) -> Self {
        Self { llm: Some(llm), tools: Some(tools) }
    }
}

/// Every node kind (start/end/llm/tool/analysis/condition/wait) implements this.
#[async_trait]
pub trait Node: Send + Sync {
    async fn execute(&self, state: &Value, deps: &NodeDeps, cancel: &CancelToken) -> Result<NodeOutcome>;
}

/// Builds a `Node` instance from its declared config. Registered per kind name.
pub type NodeFactory = Arc<dyn Fn(&Value) -> Result<Arc<dyn Node>> + Send + Sync>;

/// Maps node-kind names (as authored in a workflow spec's `kind` field) to the
/// factory that instantiates them.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    factories: HashMap<String, NodeFactory>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    pub fn register(&mut self, kind: impl Into<String>, factory: NodeFactory) -> &mut Self {
        self.factories.insert(kind.into(), factory);
        self
    }

    pub fn instantiate(&self, kind: &str, config: &Value) -> Result<Arc<dyn Node>> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| crate::error::GraphError::Configuration(format!("no node factory registered for kind '{kind}'")))?;
        factory(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Node for Echo {
        async fn execute(&self, _state: &Value, _deps: &NodeDeps, _cancel: &CancelToken) -> Result<NodeOutcome> {
            Ok(NodeOutcome::patch(json!({"touched": true})))
        }
    }

    #[tokio::test]
    async fn registry_instantiates_registered_kind() {
        let mut registry = NodeRegistry::new();
        registry.register("echo", Arc::new(|_cfg: &Value| Ok(Arc::new(Echo) as Arc<dyn Node>)));

        let node = registry.instantiate("echo", &json!({})).unwrap();
        let outcome = node.execute(&json!({}), &NodeDeps::none(), &CancelToken::new()).await.unwrap();
        assert_eq!(outcome.patch, json!({"touched": true}));
    }

    #[test]
    fn unregistered_kind_is_a_configuration_error() {
        let registry = NodeRegistry::new();
        assert!(registry.instantiate("missing", &json!({})).is_err());
    }
}

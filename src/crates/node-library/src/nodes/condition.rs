//! The `condition` node kind: evaluates a [`Predicate`] over state and sets
//! `next_override` to route around the graph's declared edges. Leaves state
//! untouched — routing only.

use async_trait::async_trait;
use graph_core::{CancelToken, Node, NodeDeps, NodeOutcome, Predicate, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::NodeError;

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionNodeConfig {
    pub predicate: Predicate,
    pub when_true: String,
    pub when_false: String,
}

pub struct ConditionNode {
    config: ConditionNodeConfig,
}

impl ConditionNode {
    pub fn new(config: ConditionNodeConfig) -> Self {
        Self { config }
    }

    pub fn from_value(config: &Value) -> Result<Self> {
        let config: ConditionNodeConfig = serde_json::from_value(config.clone())
            .map_err(|e| NodeError::InvalidConfig(e.to_string()))?;
        Ok(Self::new(config))
    }
}

#[async_trait]
impl Node for ConditionNode {
    async fn execute(&self, state: &Value, _deps: &NodeDeps, _cancel: &CancelToken) -> Result<NodeOutcome> {
        let next = if self.config.predicate.evaluate(state) {
            &self.config.when_true
        } else {
            &self.config.when_false
        };
        Ok(NodeOutcome::with_override(json!({}), next.clone()))
    }
}

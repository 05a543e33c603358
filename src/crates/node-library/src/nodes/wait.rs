//! The `wait` node kind: pauses for a configured duration, yielding cooperatively
//! so cancellation can interrupt the pause instead of running it to completion.
//! Never blocks an executor thread — `tokio::time::sleep` raced against
//! `CancelToken::cancelled`.

use async_trait::async_trait;
use graph_core::{CancelToken, GraphError, Node, NodeDeps, NodeOutcome, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::NodeError;

#[derive(Debug, Clone, Deserialize)]
pub struct WaitNodeConfig {
    pub duration_ms: u64,
}

pub struct WaitNode {
    config: WaitNodeConfig,
}

impl WaitNode {
    pub fn new(config: WaitNodeConfig) -> Self {
        Self { config }
    }

    pub fn from_value(config: &Value) -> Result<Self> {
        let config: WaitNodeConfig = serde_json::from_value(config.clone())
            .map_err(|e| NodeError::InvalidConfig(e.to_string()))?;
        Ok(Self::new(config))
    }
}

#[async_trait]
impl Node for WaitNode {
    async fn execute(&self, _state: &Value, _deps: &NodeDeps, cancel: &CancelToken) -> Result<NodeOutcome> {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(self.config.duration_ms)) => {
                Ok(NodeOutcome::patch(json!({})))
            }
            _ = cancel.cancelled() => Err(GraphError::Cancelled),
        }
    }
}

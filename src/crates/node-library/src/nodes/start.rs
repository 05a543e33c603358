//! The `start` node kind: emits `started_at`, otherwise leaves state untouched.

use async_trait::async_trait;
use chrono::Utc;
use graph_core::{CancelToken, Node, NodeDeps, NodeOutcome, Result};
use serde_json::{json, Value};

pub struct StartNode;

#[async_trait]
impl Node for StartNode {
    async fn execute(&self, _state: &Value, _deps: &NodeDeps, _cancel: &CancelToken) -> Result<NodeOutcome> {
        Ok(NodeOutcome::patch(json!({"started_at": Utc::now().to_rfc3339()})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sets_started_at() {
        let outcome = StartNode
            .execute(&json!({}), &NodeDeps::none(), &CancelToken::new())
            .await
            .unwrap();
        assert!(outcome.patch["started_at"].is_string());
    }
}

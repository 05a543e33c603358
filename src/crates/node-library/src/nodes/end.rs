//! The `end` node kind: marks the run complete.

use async_trait::async_trait;
use chrono::Utc;
use graph_core::{CancelToken, Node, NodeDeps, NodeOutcome, Result};
use serde_json::{json, Value};

pub struct EndNode;

#[async_trait]
impl Node for EndNode {
    async fn execute(&self, _state: &Value, _deps: &NodeDeps, _cancel: &CancelToken) -> Result<NodeOutcome> {
        Ok(NodeOutcome::patch(json!({"complete": true, "ended_at": Utc::now().to_rfc3339()})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn marks_complete() {
        let outcome = EndNode
            .execute(&json!({}), &NodeDeps::none(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.patch["complete"], json!(true));
    }
}

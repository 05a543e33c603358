//! The `tool` node kind: dispatches the most recent un-processed tool-call
//! descriptors from state to the Tool Runtime through [`ToolCaller`], optionally in
//! parallel up to a bounded degree, and appends the results.

use async_trait::async_trait;
use graph_core::{CancelToken, Node, NodeDeps, NodeOutcome, Result, ToolCaller};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::NodeError;

#[derive(Debug, Clone, Deserialize)]
pub struct ToolNodeConfig {
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

fn default_max_parallel() -> usize {
    1
}

impl Default for ToolNodeConfig {
    fn default() -> Self {
        Self { max_parallel: default_max_parallel() }
    }
}

pub struct ToolNode {
    config: ToolNodeConfig,
}

impl ToolNode {
    pub fn new(config: ToolNodeConfig) -> Self {
        Self { config }
    }

    pub fn from_value(config: &Value) -> Result<Self> {
        let config: ToolNodeConfig = if config.is_null() {
            ToolNodeConfig::default()
        } else {
            serde_json::from_value(config.clone()).map_err(|e| NodeError::InvalidConfig(e.to_string()))?
        };
        Ok(Self::new(config))
    }
}

/// Pending tool calls are appended to state under `tool_calls` as
/// `{"id", "name", "args"}` objects by the `llm` node; this node consumes the
/// tail of that array that has no matching entry in `tool_results` yet.
fn pending_calls(state: &Value) -> Vec<(String, String, Value)> {
    let calls = state.get("tool_calls").and_then(Value::as_array).cloned().unwrap_or_default();
    let results = state.get("tool_results").and_then(Value::as_array).cloned().unwrap_or_default();
    let resolved_ids: std::collections::HashSet<String> = results
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_str).map(str::to_string))
        .collect();

    calls
        .into_iter()
        .flat_map(|entry| match entry {
            Value::Array(items) => items,
            other => vec![other],
        })
        .filter_map(|call| {
            let id = call.get("id")?.as_str()?.to_string();
            if resolved_ids.contains(&id) {
                return None;
            }
            let name = call.get("name")?.as_str()?.to_string();
            let args = call.get("args").cloned().unwrap_or(json!({}));
            Some((id, name, args))
        })
        .collect()
}

#[async_trait]
impl Node for ToolNode {
    async fn execute(&self, state: &Value, deps: &NodeDeps, cancel: &CancelToken) -> Result<NodeOutcome> {
        let tools: &dyn ToolCaller = deps
            .tools
            .as_deref()
            .ok_or_else(|| NodeError::MissingDependency("tools".to_string()))?;

        let pending = pending_calls(state);
        if pending.is_empty() {
            return Ok(NodeOutcome::patch(json!({})));
        }

        let calls: Vec<(String, Value)> = pending.iter().map(|(_, name, args)| (name.clone(), args.clone())).collect();
        let outputs = tools.invoke_many(calls, cancel, self.config.max_parallel.max(1)).await?;

        let results: Vec<Value> = pending
            .iter()
            .zip(outputs)
            .map(|((id, name, _), output)| json!({"id": id, "name": name, "output": output}))
            .collect();

        Ok(NodeOutcome::patch(json!({"tool_results": results})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct EchoTools;

    #[async_trait]
    impl ToolCaller for EchoTools {
        async fn invoke(&self, name: &str, args: Value, _cancel: &CancelToken) -> Result<Value> {
            Ok(json!({"name": name, "echo": args}))
        }

        async fn invoke_many(
            &self,
            calls: Vec<(String, Value)>,
            cancel: &CancelToken,
            _max_parallel: usize,
        ) -> Result<Vec<Value>> {
            let mut out = Vec::new();
            for (name, args) in calls {
                out.push(self.invoke(&name, args, cancel).await?);
            }
            Ok(out)
        }
    }

    #[tokio::test]
    async fn dispatches_pending_calls_and_records_results() {
        let node = ToolNode::new(ToolNodeConfig::default());
        let deps = NodeDeps::with_tools(Arc::new(EchoTools));
        let state = json!({
            "tool_calls": [{"id": "call-1", "name": "search", "args": {"q": "rust"}}],
            "tool_results": [],
        });

        let outcome = node.execute(&state, &deps, &CancelToken::new()).await.unwrap();
        assert_eq!(outcome.patch["tool_results"][0]["id"], json!("call-1"));
        assert_eq!(outcome.patch["tool_results"][0]["output"]["name"], json!("search"));
    }

    #[tokio::test]
    async fn already_resolved_calls_are_skipped() {
        let node = ToolNode::new(ToolNodeConfig::default());
        let deps = NodeDeps::with_tools(Arc::new(EchoTools));
        let state = json!({
            "tool_calls": [{"id": "call-1", "name": "search", "args": {}}],
            "tool_results": [{"id": "call-1", "name": "search", "output": {}}],
        });

        let outcome = node.execute(&state, &deps, &CancelToken::new()).await.unwrap();
        assert_eq!(outcome.patch, json!({}));
    }

    #[tokio::test]
    async fn missing_tools_dependency_is_an_error() {
        let node = ToolNode::new(ToolNodeConfig::default());
        let result = node.execute(&json!({}), &NodeDeps::none(), &CancelToken::new()).await;
        assert!(result.is_err());
    }
}

//! The `llm` node kind: builds a prompt from config + current messages, calls the
//! LLM Scheduler through [`LlmCaller`], and appends the assistant's reply (and any
//! tool-call descriptors) to state. On failure, appends an error record instead of
//! propagating — the engine only sees a `GraphError::NodeExecution` if the
//! collaborator itself is missing (a configuration bug, not a call failure).

use async_trait::async_trait;
use graph_core::{CancelToken, LlmCaller, Node, NodeDeps, NodeOutcome, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::NodeError;
use crate::template::TemplateProcessor;

#[derive(Debug, Clone, Deserialize)]
pub struct LlmNodeConfig {
    pub selector: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub system_prompt_id: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

pub struct LlmNode {
    config: LlmNodeConfig,
}

impl LlmNode {
    pub fn new(config: LlmNodeConfig) -> Self {
        Self { config }
    }

    pub fn from_value(config: &Value) -> Result<Self> {
        let config: LlmNodeConfig = serde_json::from_value(config.clone())
            .map_err(|e| NodeError::InvalidConfig(e.to_string()))?;
        Ok(Self::new(config))
    }
}

#[async_trait]
impl Node for LlmNode {
    async fn execute(&self, state: &Value, deps: &NodeDeps, cancel: &CancelToken) -> Result<NodeOutcome> {
        let llm: &dyn LlmCaller = deps
            .llm
            .as_deref()
            .ok_or_else(|| NodeError::MissingDependency("llm".to_string()))?;

        let system_prompt = match &self.config.system_prompt {
            Some(template) => Some(TemplateProcessor::render(template, state)?),
            None => None,
        };

        let messages = state.get("messages").cloned().unwrap_or(json!([]));
        let request = json!({
            "system_prompt": system_prompt,
            "system_prompt_id": self.config.system_prompt_id,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "timeout_ms": self.config.timeout_ms,
        });

        match llm.invoke(&self.config.selector, request, cancel).await {
            Ok(response) => {
                let content = response.get("content").cloned().unwrap_or(Value::Null);
                let mut message = json!({"role": "assistant", "content": content});
                if let Some(tool_calls) = response.get("tool_calls") {
                    message["tool_call_ids"] = tool_calls.clone();
                }

                let mut patch = json!({"messages": [message]});
                if let Some(tool_calls) = response.get("tool_calls") {
                    patch["tool_calls"] = json!([tool_calls.clone()]);
                }
                Ok(NodeOutcome::patch(patch))
            }
            Err(err) => Ok(NodeOutcome::patch(json!({
                "errors": [{"node": "llm", "selector": self.config.selector, "error": err.to_string()}],
            }))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct ScriptedLlm(Value);

    #[async_trait]
    impl LlmCaller for ScriptedLlm {
        async fn invoke(&self, _selector: &str, _request: Value, _cancel: &CancelToken) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn appends_assistant_message_on_success() {
        let node = LlmNode::new(LlmNodeConfig {
            selector: "plan.echelon1".to_string(),
            system_prompt: None,
            system_prompt_id: None,
            max_tokens: None,
            timeout_ms: None,
        });
        let deps = NodeDeps::with_llm(Arc::new(ScriptedLlm(json!({"content": "ok"}))));

        let outcome = node.execute(&json!({"messages": []}), &deps, &CancelToken::new()).await.unwrap();
        assert_eq!(outcome.patch["messages"][0]["content"], json!("ok"));
    }

    #[tokio::test]
    async fn missing_llm_dependency_is_an_error() {
        let node = LlmNode::new(LlmNodeConfig {
            selector: "plan.echelon1".to_string(),
            system_prompt: None,
            system_prompt_id: None,
            max_tokens: None,
            timeout_ms: None,
        });
        let result = node.execute(&json!({}), &NodeDeps::none(), &CancelToken::new()).await;
        assert!(result.is_err());
    }
}

//! The `analysis` node kind: an `llm` specialization whose reply is expected to be
//! a JSON object, parsed and merged into state under a configured key rather than
//! appended to the message history.

use async_trait::async_trait;
use graph_core::{CancelToken, LlmCaller, Node, NodeDeps, NodeOutcome, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::NodeError;
use crate::template::TemplateProcessor;

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisNodeConfig {
    pub selector: String,
    pub output_key: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

pub struct AnalysisNode {
    config: AnalysisNodeConfig,
}

impl AnalysisNode {
    pub fn new(config: AnalysisNodeConfig) -> Self {
        Self { config }
    }

    pub fn from_value(config: &Value) -> Result<Self> {
        let config: AnalysisNodeConfig = serde_json::from_value(config.clone())
            .map_err(|e| NodeError::InvalidConfig(e.to_string()))?;
        Ok(Self::new(config))
    }
}

#[async_trait]
impl Node for AnalysisNode {
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
            "messages": messages,
            "response_format": "json",
            "timeout_ms": self.config.timeout_ms,
        });

        match llm.invoke(&self.config.selector, request, cancel).await {
            Ok(response) => {
                let parsed = match response.get("content") {
                    Some(Value::String(s)) => {
                        serde_json::from_str(s).map_err(|e| NodeError::Llm(format!("analysis output was not valid JSON: {e}")))?
                    }
                    Some(other) => other.clone(),
                    None => return Err(NodeError::Llm("analysis response had no content field".to_string()).into()),
                };
                let mut patch = serde_json::Map::new();
                patch.insert(self.config.output_key.clone(), parsed);
                Ok(NodeOutcome::patch(Value::Object(patch)))
            }
            Err(err) => Ok(NodeOutcome::patch(json!({
                "errors": [{"node": "analysis", "selector": self.config.selector, "error": err.to_string()}],
            }))),
        }
    }
}

//! `ToolSpec`: a registered tool's name, description, argument schema, and executor
//! closure. Grounded on the teacher's `langgraph_core::tool::Tool`, narrowed from the
//! teacher's `(Value, Option<ToolRuntime>) -> ToolFuture` executor (a context bundle
//! carrying store/stream/config handles this spec's tools don't need) down to
//! `(Value, CancelToken) -> ToolFuture`, matching §4.6's `invoke(args, cancel)`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use graph_core::CancelToken;

use crate::error::{Result, ToolError};

pub type ToolInvokeResult = std::result::Result<Value, String>;
pub type ToolFuture = Pin<Box<dyn Future<Output = ToolInvokeResult> + Send>>;
pub type ToolExecutor = Arc<dyn Fn(Value, CancelToken) -> ToolFuture + Send + Sync>;

pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub argument_schema: Value,
    executor: ToolExecutor,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, argument_schema: Value, executor: ToolExecutor) -> Self {
        Self { name: name.into(), description: description.into(), argument_schema, executor }
    }

    /// Basic validation: arguments must be a JSON object. Full JSON Schema
    /// validation against `argument_schema` is out of scope for this runtime (the
    /// spec names schema validation as a contract, not a grammar to implement).
    pub fn validate_args(&self, args: &Value) -> Result<()> {
        if !args.is_object() {
            return Err(ToolError::ValidationError { tool: self.name.clone(), error: "arguments must be an object".to_string() });
        }
        Ok(())
    }

    pub async fn invoke(&self, args: Value, cancel: CancelToken) -> ToolInvokeResult {
        (self.executor)(args, cancel).await
    }

    /// The `{name, description, parameters}` shape an LLM backend expects for
    /// function-calling tool schemas.
    pub fn to_llm_schema(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.argument_schema,
        })
    }
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("argument_schema", &self.argument_schema)
            .finish()
    }
}

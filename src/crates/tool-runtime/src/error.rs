//! Tool Runtime error taxonomy (§4.6, §7). Registry/validation failures are real
//! errors (`?` all the way up); a failing tool *invocation* is business data, not an
//! error — see `result::ToolResult`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolError>;

#[derive(Error, Debug, Clone)]
pub enum ToolError {
    #[error("tool '{0}' not found. Available tools: {1}")]
    NotFound(String, String),

    #[error("invalid arguments for tool '{tool}': {error}")]
    ValidationError { tool: String, error: String },

    #[error("tool invocation cancelled")]
    Cancelled,
}

impl From<ToolError> for graph_core::GraphError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Cancelled => graph_core::GraphError::Cancelled,
            other => graph_core::GraphError::NodeExecution { node: "tool".to_string(), error: other.to_string() },
        }
    }
}

//! Error types for built-in node execution.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("template field not found: {0}")]
    TemplateField(String),

    #[error("node is missing a required collaborator: {0}")]
    MissingDependency(String),

    #[error("node config is missing or malformed field: {0}")]
    InvalidConfig(String),

    #[error("llm call failed: {0}")]
    Llm(String),

    #[error("tool call failed: {0}")]
    Tool(String),
}

impl From<NodeError> for graph_core::GraphError {
    fn from(err: NodeError) -> Self {
        graph_core::GraphError::NodeExecution {
            node: "unknown".to_string(),
            error: err.to_string(),
        }
    }
}

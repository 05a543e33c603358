//! Error types for graph construction and execution (§7).
//!
//! `GraphError` aggregates the lower layers' errors via `#[from]`, so `?` carries a
//! `StateError` or `StoreError` straight through an engine method without manual
//! wrapping — the same shape as the teacher's
//! `GraphError::Checkpoint(#[from] langgraph_checkpoint::CheckpointError)`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    /// Graph structure invalid: missing entry point, dangling edge endpoint, or a
    /// node unreachable from the entry point.
    #[error("graph validation failed: {0}")]
    Validation(String),

    /// `inherits_from` chain loops back on itself.
    #[error("inheritance cycle detected while resolving spec: {0}")]
    InheritanceCycle(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("node '{node}' execution failed: {error}")]
    NodeExecution { node: String, error: String },

    #[error("execution exceeded max_iterations ({0})")]
    IterationLimitExceeded(usize),

    #[error("run was cancelled")]
    Cancelled,

    #[error("state error: {0}")]
    State(#[from] graph_state::StateError),

    #[error("store error: {0}")]
    Store(#[from] graph_checkpoint::StoreError),

    #[error("yaml parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("operation timed out after {duration_ms}ms: {operation}")]
    Timeout { operation: String, duration_ms: u64 },

    #[error("{0}")]
    Custom(String),
}

/// Whether an engine-surfaced error should be retried by the node's own retry
/// policy, as opposed to being permanent (abort run or route to an error edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

impl GraphError {
    /// Classifies this error for the engine's retry decision. Node-execution and
    /// timeout errors are transient; everything else (validation, structural,
    /// cancellation) is permanent.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::NodeExecution { .. } | GraphError::Timeout { .. } => ErrorKind::Transient,
            _ => ErrorKind::Permanent,
        }
    }
}

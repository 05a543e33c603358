//! Graph Builder (C2) and Execution Engine (C3): parse workflow specs, validate and
//! compile them into executable graphs, and run them against a `graph-checkpoint`
//! `StateStore`.

pub mod builder;
pub mod cancel;
pub mod engine;
pub mod error;
pub mod graph;
pub mod node;
pub mod spec;

pub use builder::{CompiledGraph, GraphBuilder, RouteFn};
pub use cancel::CancelToken;
pub use engine::{CheckpointPolicy, ExecutionConfig, ExecutionEngine, ExecutionResult, RetryPolicy};
pub use error::{ErrorKind, GraphError, Result};
pub use graph::{ConditionalCase, Edge, Graph, NodeId, NodeSpec, Predicate};
pub use node::{LlmCaller, Node, NodeDeps, NodeFactory, NodeOutcome, NodeRegistry, ToolCaller};
pub use spec::{FilesystemSpecSource, SpecSource, WorkflowSpec, WorkflowSpecLoader};

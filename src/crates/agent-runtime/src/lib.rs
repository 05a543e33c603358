//! Agent Runtime: the top-level `Run`/`RunHandle`/`Resume` surface (§6) wiring the
//! Graph Builder/Execution Engine (`graph-core`), the standard node kinds
//! (`node-library`), the LLM Scheduler (`llm-scheduler`), and the Tool Runtime
//! (`tool-runtime`) together against a `graph-checkpoint` `StateStore`.

pub mod error;
pub mod registry;
pub mod run;

pub use error::{exit_code_for, ExitCode, Result, RuntimeError};
pub use registry::WorkflowRegistry;
pub use run::{AgentRuntime, RunHandle, RunOptions};

//! Tool Runtime (C6) — registers tools, validates arguments, dispatches
//! invocations, and collects structured results and errors (§4.6).

pub mod error;
pub mod registry;
pub mod result;
pub mod runtime;
pub mod tool;

pub use error::{Result, ToolError};
pub use registry::ToolRegistry;
pub use result::ToolResult;
pub use runtime::ToolRuntime;
pub use tool::{ToolExecutor, ToolFuture, ToolInvokeResult, ToolSpec};

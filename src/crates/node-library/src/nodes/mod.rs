//! Built-in node kinds, one module per kind (§4.4).

pub mod analysis;
pub mod condition;
pub mod end;
pub mod llm;
pub mod start;
pub mod tool;
pub mod wait;

pub use analysis::{AnalysisNode, AnalysisNodeConfig};
pub use condition::{ConditionNode, ConditionNodeConfig};
pub use end::EndNode;
pub use llm::{LlmNode, LlmNodeConfig};
pub use start::StartNode;
pub use tool::{ToolNode, ToolNodeConfig};
pub use wait::{WaitNode, WaitNodeConfig};

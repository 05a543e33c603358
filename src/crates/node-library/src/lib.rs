//! Built-in node kinds (C4): the seven node kinds a workflow spec's `kind` field
//! can name, and the `{{...}}` template processor node configs are rendered
//! through before use.

pub mod error;
pub mod nodes;
pub mod registry;
pub mod template;

pub use error::{NodeError, Result};
pub use nodes::{
    AnalysisNode, AnalysisNodeConfig, ConditionNode, ConditionNodeConfig, EndNode, LlmNode, LlmNodeConfig, StartNode,
    ToolNode, ToolNodeConfig, WaitNode, WaitNodeConfig,
};
pub use registry::register_standard_nodes;
pub use template::TemplateProcessor;

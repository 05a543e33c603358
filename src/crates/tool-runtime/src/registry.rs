//! `ToolRegistry`: the name → `ToolSpec` lookup table. Grounded on the teacher's
//! `langgraph_core::tool::ToolRegistry` (`register`/`get`/`has_tool`/`tool_names`).

use std::collections::HashMap;

use serde_json::Value;

use crate::tool::ToolSpec;

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: ToolSpec) {
        self.tools.insert(tool.name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// The `[tool_schema]` list a backend's function-calling request is built from.
    pub fn list_for_llm(&self) -> Vec<Value> {
        self.tools.values().map(ToolSpec::to_llm_schema).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn noop_tool(name: &str) -> ToolSpec {
        ToolSpec::new(name, "does nothing", serde_json::json!({}), Arc::new(|_args, _cancel| Box::pin(async { Ok(serde_json::json!({})) })))
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(noop_tool("search"));
        assert!(registry.has_tool("search"));
        assert!(!registry.has_tool("calculator"));
        assert_eq!(registry.tool_names(), vec!["search".to_string()]);
    }

    #[test]
    fn list_for_llm_exposes_schemas() {
        let mut registry = ToolRegistry::new();
        registry.register(noop_tool("search"));
        let schemas = registry.list_for_llm();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0]["name"], serde_json::json!("search"));
    }
}

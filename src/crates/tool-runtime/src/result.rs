//! `ToolResult` (§4.6): the structured success/error envelope every invocation is
//! wrapped in, so `invoke`/`invoke_many` callers never see a raw exception.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, content: Value, duration_ms: u64) -> Self {
        Self { name: name.into(), success: true, content: Some(content), error: None, duration_ms }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self { name: name.into(), success: false, content: None, error: Some(error.into()), duration_ms }
    }

    pub fn into_value(self) -> Value {
        serde_json::to_value(self).expect("ToolResult always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_omits_error_field() {
        let value = ToolResult::success("search", serde_json::json!({"hits": 3}), 12).into_value();
        assert_eq!(value["success"], serde_json::json!(true));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn failure_omits_content_field() {
        let value = ToolResult::failure("search", "boom", 5).into_value();
        assert_eq!(value["success"], serde_json::json!(false));
        assert!(value.get("content").is_none());
    }
}

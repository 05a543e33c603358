//! `ToolRuntime`: the Tool Runtime's `ToolCaller` surface (§4.6) — validates,
//! dispatches, and wraps every call into a `ToolResult`, bounding `invoke_many`'s
//! concurrency with a semaphore. Grounded on the teacher's `ToolRegistry::
//! execute_tool_call`/`execute_tool_calls`, generalized to bound parallelism: the
//! teacher's `execute_tool_calls` hands every call straight to `futures::future::
//! join_all` with no cap, which this spec's `max_parallel` parameter requires fixing.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;

use graph_core::CancelToken;

use crate::error::ToolError;
use crate::registry::ToolRegistry;
use crate::result::ToolResult;

pub struct ToolRuntime {
    registry: ToolRegistry,
}

impl ToolRuntime {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Validates and dispatches a single call, always returning an `Ok`-wrapped
    /// `ToolResult` — a missing tool, a validation failure, and an executor error
    /// are all captured as `{success: false, error}` data rather than propagated,
    /// per §4.6's failure semantics.
    async fn dispatch(&self, name: &str, args: Value, cancel: &CancelToken) -> Value {
        let start = Instant::now();
        let elapsed_ms = |start: Instant| start.elapsed().as_millis() as u64;

        let Some(tool) = self.registry.get(name) else {
            let error = ToolError::NotFound(name.to_string(), self.registry.tool_names().join(", "));
            return ToolResult::failure(name, error.to_string(), elapsed_ms(start)).into_value();
        };

        if let Err(err) = tool.validate_args(&args) {
            return ToolResult::failure(name, err.to_string(), elapsed_ms(start)).into_value();
        }

        tokio::select! {
            result = tool.invoke(args, cancel.clone()) => match result {
                Ok(content) => ToolResult::success(name, content, elapsed_ms(start)).into_value(),
                Err(error) => ToolResult::failure(name, error, elapsed_ms(start)).into_value(),
            },
            _ = cancel.cancelled() => ToolResult::failure(name, ToolError::Cancelled.to_string(), elapsed_ms(start)).into_value(),
        }
    }
}

#[async_trait]
impl graph_core::ToolCaller for ToolRuntime {
    async fn invoke(&self, name: &str, args: Value, cancel: &CancelToken) -> graph_core::Result<Value> {
        Ok(self.dispatch(name, args, cancel).await)
    }

    /// Runs every call through a shared semaphore of `max_parallel` permits,
    /// preserving the caller's original order in the returned `Vec`.
    async fn invoke_many(&self, calls: Vec<(String, Value)>, cancel: &CancelToken, max_parallel: usize) -> graph_core::Result<Vec<Value>> {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled.into());
        }

        let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
        let futures = calls.into_iter().map(|(name, args)| {
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
                self.dispatch(&name, args, &cancel).await
            }
        });

        Ok(join_all(futures).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolSpec;

    fn runtime_with_echo_and_slow_tools() -> ToolRuntime {
        let mut registry = ToolRegistry::new();
        registry.register(ToolSpec::new(
            "echo",
            "echoes its input",
            serde_json::json!({}),
            Arc::new(|args, _cancel| Box::pin(async move { Ok(args) })),
        ));
        registry.register(ToolSpec::new(
            "boom",
            "always fails",
            serde_json::json!({}),
            Arc::new(|_args, _cancel| Box::pin(async move { Err("kaboom".to_string()) })),
        ));
        ToolRuntime::new(registry)
    }

    #[tokio::test]
    async fn unknown_tool_is_captured_as_a_failed_result_not_an_error() {
        let runtime = runtime_with_echo_and_slow_tools();
        let result = runtime.dispatch("missing", serde_json::json!({}), &CancelToken::new()).await;
        assert_eq!(result["success"], serde_json::json!(false));
        assert!(result["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn executor_error_is_captured_as_a_failed_result() {
        let runtime = runtime_with_echo_and_slow_tools();
        let result = runtime.dispatch("boom", serde_json::json!({}), &CancelToken::new()).await;
        assert_eq!(result["success"], serde_json::json!(false));
        assert_eq!(result["error"], serde_json::json!("kaboom"));
    }

    #[tokio::test]
    async fn invoke_many_preserves_call_order() {
        use graph_core::ToolCaller;
        let runtime = runtime_with_echo_and_slow_tools();
        let calls = vec![
            ("echo".to_string(), serde_json::json!({"n": 1})),
            ("boom".to_string(), serde_json::json!({})),
            ("echo".to_string(), serde_json::json!({"n": 3})),
        ];
        let results = runtime.invoke_many(calls, &CancelToken::new(), 2).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["content"]["n"], serde_json::json!(1));
        assert_eq!(results[1]["success"], serde_json::json!(false));
        assert_eq!(results[2]["content"]["n"], serde_json::json!(3));
    }
}

//! The backend abstraction the scheduler calls through (§4.5), grounded on the
//! teacher's `langgraph_core::llm::traits::ChatModel` but narrowed to the plain
//! JSON request/response shape the rest of this workspace uses instead of the
//! teacher's typed `ChatRequest`/`ChatResponse`/streaming surface — streaming is out
//! of scope here (no node kind in §4.4 consumes a token stream).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{BackendError, Result as SchedulerResult};

/// One callable LLM backend (a concrete model_id's client).
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, request: Value) -> Result<Value, BackendError>;

    /// Default availability probe used by health checks (§4.5). Backends whose
    /// liveness can't cheaply be checked can rely on this default.
    async fn is_available(&self) -> bool {
        true
    }

    fn clone_box(&self) -> Box<dyn ChatModel>;
}

impl Clone for Box<dyn ChatModel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A scripted backend for the deterministic scenarios in §8: returns queued
/// responses/errors in order, repeating the last entry once exhausted.
#[derive(Clone)]
pub struct MockChatModel {
    script: std::sync::Arc<std::sync::Mutex<Vec<Result<Value, BackendError>>>>,
    cursor: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

impl MockChatModel {
    pub fn new(script: Vec<Result<Value, BackendError>>) -> Self {
        Self {
            script: std::sync::Arc::new(std::sync::Mutex::new(script)),
            cursor: std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        }
    }

    pub fn always_succeeds(response: Value) -> Self {
        Self::new(vec![Ok(response)])
    }

    pub fn always_fails(error: BackendError) -> Self {
        Self::new(vec![Err(error)])
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn chat(&self, _request: Value) -> Result<Value, BackendError> {
        let script = self.script.lock().expect("mock script lock");
        if script.is_empty() {
            return Err(BackendError::Unknown("empty script".to_string()));
        }
        let idx = self.cursor.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(script[idx.min(script.len() - 1)].clone()?)
    }

    fn clone_box(&self) -> Box<dyn ChatModel> {
        Box::new(self.clone())
    }
}

/// Resolves a `model_id` to a concrete backend client. Injected by the caller
/// (`agent-runtime`) since the Scheduler itself holds no knowledge of how
/// individual provider clients are constructed or authenticated.
pub trait BackendFactory: Send + Sync {
    fn resolve(&self, model_id: &str) -> SchedulerResult<std::sync::Arc<dyn ChatModel>>;
}

/// A factory backed by a static map, sufficient for tests and simple deployments
/// that construct all backend clients up front.
#[derive(Clone, Default)]
pub struct StaticBackendFactory {
    backends: std::collections::HashMap<String, std::sync::Arc<dyn ChatModel>>,
}

impl StaticBackendFactory {
    pub fn new() -> Self {
        Self { backends: std::collections::HashMap::new() }
    }

    pub fn with(mut self, model_id: impl Into<String>, backend: std::sync::Arc<dyn ChatModel>) -> Self {
        self.backends.insert(model_id.into(), backend);
        self
    }
}

impl BackendFactory for StaticBackendFactory {
    fn resolve(&self, model_id: &str) -> SchedulerResult<std::sync::Arc<dyn ChatModel>> {
        self.backends
            .get(model_id)
            .cloned()
            .ok_or_else(|| crate::error::SchedulerError::Configuration(format!("no backend registered for model '{model_id}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn mock_chat_model_repeats_last_response() {
        let model = MockChatModel::new(vec![Ok(json!({"content": "first"}))]);
        assert_eq!(model.chat(json!({})).await.unwrap(), json!({"content": "first"}));
        assert_eq!(model.chat(json!({})).await.unwrap(), json!({"content": "first"}));
    }

    #[tokio::test]
    async fn static_factory_resolves_registered_model() {
        let factory = StaticBackendFactory::new().with("gpt-4", std::sync::Arc::new(MockChatModel::always_succeeds(json!({}))));
        assert!(factory.resolve("gpt-4").is_ok());
        assert!(factory.resolve("missing").is_err());
    }
}

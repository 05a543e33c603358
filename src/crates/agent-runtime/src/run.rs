//! The `Run`/`RunHandle`/`Resume` external interface (§6): a cancellable,
//! resumable handle wrapping a `tokio::task::JoinHandle`, generalizing the
//! teacher's `CompiledGraph::invoke`/`invoke_with_config` surface with the
//! cancellation and snapshot-id accessors this spec's `RunHandle` contract adds.

use std::sync::Arc;
use std::sync::Mutex;

use graph_checkpoint::{StateHandle, StateStore};
use graph_core::{CancelToken, CheckpointPolicy, CompiledGraph, ExecutionConfig, ExecutionEngine, ExecutionResult, GraphError, NodeDeps, RetryPolicy};
use serde_json::Value;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Result, RuntimeError};
use crate::registry::WorkflowRegistry;

/// Per-run configuration the caller supplies to `Run`/`Resume`; everything here
/// maps directly onto an `ExecutionConfig`, plus the run-identifying ids
/// `Snapshot()` stamps onto the persisted record.
#[derive(Clone)]
pub struct RunOptions {
    pub workflow_id: Option<String>,
    pub thread_id: Option<String>,
    pub agent_id: String,
    pub max_iterations: usize,
    pub checkpoint_policy: CheckpointPolicy,
    pub retry_policy: RetryPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workflow_id: None,
            thread_id: None,
            agent_id: "agent".to_string(),
            max_iterations: 100,
            checkpoint_policy: CheckpointPolicy::OnError,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl RunOptions {
    fn into_execution_config(self, workflow_name: &str) -> ExecutionConfig {
        ExecutionConfig {
            max_iterations: self.max_iterations,
            checkpoint_policy: self.checkpoint_policy,
            retry_policy: self.retry_policy,
            workflow_id: self.workflow_id.unwrap_or_else(|| workflow_name.to_string()),
            thread_id: self.thread_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            agent_id: self.agent_id,
        }
    }
}

/// A running (or completed) workflow execution. `Wait` can only be called once —
/// it consumes the underlying task handle — mirroring a plain `JoinHandle`'s own
/// one-shot semantics rather than requiring an `Arc`-shared broadcast the spec's
/// interface doesn't ask for.
pub struct RunHandle {
    handle: StateHandle,
    cancel: CancelToken,
    store: Arc<dyn StateStore>,
    workflow_id: String,
    thread_id: String,
    task: Mutex<Option<JoinHandle<std::result::Result<ExecutionResult, GraphError>>>>,
}

impl RunHandle {
    /// Awaits completion, returning the final workflow state or the error the
    /// engine terminated with (including `GraphError::Cancelled` after `Cancel()`).
    pub async fn wait(&self) -> Result<Value> {
        let task = self
            .task
            .lock()
            .expect("run task lock")
            .take()
            .ok_or_else(|| RuntimeError::UnknownRun("Wait() already called on this handle".to_string()))?;

        match task.await {
            Ok(Ok(result)) => Ok(result.final_state),
            Ok(Err(graph_err)) => Err(graph_err.into()),
            Err(join_err) => Err(RuntimeError::Configuration(format!("run task did not complete: {join_err}"))),
        }
    }

    /// Requests cooperative cancellation; the running node finishes its current
    /// step, then `Wait()` resolves to `GraphError::Cancelled` (§8's bounded-time
    /// cancellation-propagation property).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Snapshots the live state at whatever point execution has reached so far,
    /// independent of `Wait()` — usable while the run is still in flight.
    pub async fn snapshot(&self) -> Result<String> {
        let id = self
            .store
            .snapshot(&self.handle, &self.workflow_id, &self.thread_id, Some("manual".to_string()))
            .await
            .map_err(GraphError::from)?;
        Ok(id.to_string())
    }
}

/// Top-level runtime: a compiled-workflow cache plus the collaborator handles
/// (`StateStore`, `LlmCaller`, `ToolCaller`) every run is executed against.
pub struct AgentRuntime {
    workflows: WorkflowRegistry,
    store: Arc<dyn StateStore>,
    deps: NodeDeps,
}

impl AgentRuntime {
    pub fn new(workflows: WorkflowRegistry, store: Arc<dyn StateStore>, deps: NodeDeps) -> Self {
        Self { workflows, store, deps }
    }

    pub fn workflows(&self) -> &WorkflowRegistry {
        &self.workflows
    }

    /// `Run(workflow_name, initial_state, options)→RunHandle` (§6). Compiles (or
    /// reuses) the named workflow, seeds a fresh live state, and spawns execution.
    pub async fn run(&self, workflow_name: &str, initial_state: Value, options: RunOptions) -> Result<RunHandle> {
        let compiled = self.workflows.compile(workflow_name)?;
        let handle = self.store.create(initial_state).await.map_err(GraphError::from)?;
        self.spawn(workflow_name, compiled, handle, options)
    }

    /// `Resume(snapshot_id, options)→RunHandle` (§6). Restores the snapshot into a
    /// new live handle and continues from wherever `__current_node` left off
    /// (`ExecutionEngine::resume`'s own fallback to the entry point covers a
    /// snapshot taken before the first node ran).
    pub async fn resume(&self, workflow_name: &str, snapshot_id: &str, options: RunOptions) -> Result<RunHandle> {
        let compiled = self.workflows.compile(workflow_name)?;
        let snapshot_id = graph_checkpoint::SnapshotId(snapshot_id.to_string());
        let handle = self.store.restore(&snapshot_id).await.map_err(GraphError::from)?;
        self.spawn(workflow_name, compiled, handle, options)
    }

    fn spawn(
        &self,
        workflow_name: &str,
        compiled: Arc<CompiledGraph>,
        handle: StateHandle,
        options: RunOptions,
    ) -> Result<RunHandle> {
        let cancel = CancelToken::new();
        let workflow_id = options.workflow_id.clone().unwrap_or_else(|| workflow_name.to_string());
        let thread_id = options.thread_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        let config = options.into_execution_config(workflow_name);

        let store = Arc::clone(&self.store);
        let deps = self.deps.clone();
        let task_cancel = cancel.clone();
        let task_handle = handle.clone();

        let task = tokio::spawn(async move {
            let engine = ExecutionEngine::new(store, deps, &config);
            engine.resume(&compiled, &task_handle, &task_cancel).await
        });

        Ok(RunHandle {
            handle,
            cancel,
            store: Arc::clone(&self.store),
            workflow_id,
            thread_id,
            task: Mutex::new(Some(task)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_checkpoint::InMemoryStateStore;
    use serde_json::json;
    use std::io::Write;

    struct TempDir(std::path::PathBuf);

    impl TempDir {
        fn new() -> Self {
            let path = std::env::temp_dir().join(format!("agent-runtime-run-test-{}", Uuid::new_v4()));
            std::fs::create_dir_all(&path).unwrap();
            Self(path)
        }

        fn path(&self) -> &std::path::Path {
            &self.0
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn write_spec(dir: &std::path::Path, name: &str, contents: &str) {
        let mut file = std::fs::File::create(dir.join(format!("{name}.yaml"))).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    fn runtime_with_linear_spec(dir: &std::path::Path) -> AgentRuntime {
        write_spec(
            dir,
            "linear",
            r#"
name: linear
entry_point: start
nodes:
  start: { kind: start, config: {} }
  end: { kind: end, config: {} }
edges:
  - { kind: simple, from: start, to: end }
"#,
        );
        let workflows = WorkflowRegistry::new(dir);
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        AgentRuntime::new(workflows, store, NodeDeps::none())
    }

    #[tokio::test]
    async fn run_reaches_the_terminal_node_and_wait_returns_final_state() {
        let dir = TempDir::new();
        let runtime = runtime_with_linear_spec(dir.path());

        let run = runtime.run("linear", json!({"seed": 1}), RunOptions::default()).await.unwrap();
        let final_state = run.wait().await.unwrap();
        assert_eq!(final_state["seed"], json!(1));
    }

    #[tokio::test]
    async fn cancel_before_first_node_makes_wait_return_cancelled() {
        let dir = TempDir::new();
        let runtime = runtime_with_linear_spec(dir.path());

        let run = runtime.run("linear", json!({}), RunOptions::default()).await.unwrap();
        run.cancel();
        let err = run.wait().await.unwrap_err();
        assert!(matches!(err, RuntimeError::Graph(GraphError::Cancelled)));
    }

    #[tokio::test]
    async fn resume_from_a_snapshot_continues_to_the_same_final_state() {
        let dir = TempDir::new();
        write_spec(
            dir.path(),
            "three_step",
            r#"
name: three_step
entry_point: start
nodes:
  start: { kind: start, config: {} }
  middle: { kind: wait, config: { duration_ms: 0 } }
  end: { kind: end, config: {} }
edges:
  - { kind: simple, from: start, to: middle }
  - { kind: simple, from: middle, to: end }
"#,
        );
        let workflows = WorkflowRegistry::new(dir.path());
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let runtime = AgentRuntime::new(workflows, store, NodeDeps::none());

        let mut options = RunOptions::default();
        options.checkpoint_policy = CheckpointPolicy::Always;
        let run = runtime.run("three_step", json!({}), options).await.unwrap();
        let snapshot_id = run.snapshot().await.unwrap();
        let final_state = run.wait().await.unwrap();

        let resumed = runtime.resume("three_step", &snapshot_id, RunOptions::default()).await.unwrap();
        let resumed_state = resumed.wait().await.unwrap();
        assert_eq!(resumed_state, final_state);
    }
}

//! The execution engine's main loop (§4.3): sequence nodes, apply patches through a
//! [`StateStore`], honor checkpoints, retry transient node failures, and respond to
//! cancellation.
//!
//! Retry/backoff grounded on the teacher's `pregel::executor::TaskExecutor::execute`
//! / `calculate_delay` (`initial_interval * backoff_factor^(attempt-1)`, capped at
//! `max_interval`, 0-25% jitter).

use std::sync::Arc;
use std::time::Duration;

use graph_checkpoint::{StateHandle, StateStore};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::builder::CompiledGraph;
use crate::cancel::CancelToken;
use crate::error::{ErrorKind, GraphError, Result};
use crate::node::NodeDeps;

/// Per-node retry policy, mirroring the teacher's `RetryPolicy`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_interval: f64,
    pub backoff_factor: f64,
    pub max_interval: f64,
    pub max_attempts: usize,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: 0.5,
            backoff_factor: 2.0,
            max_interval: 30.0,
            max_attempts: 3,
            jitter: true,
        }
    }
}

fn calculate_delay(policy: &RetryPolicy, attempt: usize) -> Duration {
    let base = policy.initial_interval;
    let multiplier = policy.backoff_factor.powi((attempt - 1) as i32);
    let delay = (base * multiplier).min(policy.max_interval);

    let final_delay = if policy.jitter {
        use rand::Rng;
        let jitter_factor = rand::thread_rng().gen_range(0.0..0.25);
        delay * (1.0 + jitter_factor)
    } else {
        delay
    };
    Duration::from_secs_f64(final_delay)
}

/// When an engine takes a snapshot relative to node execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointPolicy {
    Always,
    EveryNSteps(usize),
    OnError,
    OnLlmNode,
    Never,
}

impl CheckpointPolicy {
    fn should_checkpoint(&self, step: usize, node_kind: &str, failed: bool) -> bool {
        match self {
            CheckpointPolicy::Always => true,
            CheckpointPolicy::EveryNSteps(n) => *n > 0 && step % n == 0,
            CheckpointPolicy::OnError => failed,
            CheckpointPolicy::OnLlmNode => node_kind == "llm",
            CheckpointPolicy::Never => false,
        }
    }
}

pub struct ExecutionConfig {
    pub max_iterations: usize,
    pub checkpoint_policy: CheckpointPolicy,
    pub retry_policy: RetryPolicy,
    pub workflow_id: String,
    pub thread_id: String,
    pub agent_id: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            checkpoint_policy: CheckpointPolicy::OnError,
            retry_policy: RetryPolicy::default(),
            workflow_id: "workflow".to_string(),
            thread_id: "thread".to_string(),
            agent_id: "agent".to_string(),
        }
    }
}

/// Outcome of a completed (or aborted) run.
pub struct ExecutionResult {
    pub final_state: Value,
    pub iteration_count: usize,
    pub last_snapshot_id: Option<String>,
}

/// State key the engine uses to remember which node to resume at. Invisible to
/// node authors (no node reads or writes it) and merged through the default
/// overwrite reducer like any other untyped key, so `Resume` needs no schema or
/// store changes of its own (§6's `RunHandle.Snapshot`/`Resume` pair).
const CURRENT_NODE_KEY: &str = "__current_node";

/// The standard `iteration_count` state key (§3, overwrite reducer): patched with
/// the engine's own step counter after every node transition, so a run's final
/// state reports the same count `ExecutionResult::iteration_count` does.
const ITERATION_COUNT_KEY: &str = "iteration_count";

/// Runs a [`CompiledGraph`] to completion against a [`StateStore`]-backed state
/// handle, one node invocation at a time.
pub struct ExecutionEngine<'a> {
    store: Arc<dyn StateStore>,
    deps: NodeDeps,
    config: &'a ExecutionConfig,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(store: Arc<dyn StateStore>, deps: NodeDeps, config: &'a ExecutionConfig) -> Self {
        Self { store, deps, config }
    }

    pub async fn execute(
        &self,
        compiled: &CompiledGraph,
        initial_state: Value,
        cancel: &CancelToken,
    ) -> Result<ExecutionResult> {
        let handle = self.store.create(initial_state).await?;
        self.run(compiled, &handle, compiled.entry_point().clone(), cancel).await
    }

    /// Continues a previously-interrupted run from an existing state handle,
    /// picking up at whichever node the last completed step left behind in
    /// `__current_node` (entry point if the handle predates this key, e.g. a
    /// snapshot taken before the first node ran).
    pub async fn resume(&self, compiled: &CompiledGraph, handle: &StateHandle, cancel: &CancelToken) -> Result<ExecutionResult> {
        let state = self.store.read(handle).await?;
        let start_node = state
            .get(CURRENT_NODE_KEY)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| compiled.entry_point().clone());
        self.run(compiled, handle, start_node, cancel).await
    }

    async fn run(&self, compiled: &CompiledGraph, handle: &StateHandle, start_node: crate::graph::NodeId, cancel: &CancelToken) -> Result<ExecutionResult> {
        let mut current_node = start_node;
        let mut last_snapshot_id: Option<String> = None;

        // Step 2 (§4.3) gates on the standard `iteration_count` state key, not a
        // fresh-per-call local: a resumed run must keep counting from however many
        // iterations the state already recorded before cancellation, not reset to 0.
        let mut iteration_count = self
            .store
            .read(handle)
            .await?
            .get(ITERATION_COUNT_KEY)
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(0);

        loop {
            if cancel.is_cancelled() {
                if self.config.checkpoint_policy != CheckpointPolicy::Never {
                    last_snapshot_id = self.snapshot(handle, "cancelled").await.ok();
                }
                return Err(GraphError::Cancelled);
            }

            if iteration_count >= self.config.max_iterations {
                return Err(GraphError::IterationLimitExceeded(self.config.max_iterations));
            }

            let node = compiled
                .node(&current_node)
                .ok_or_else(|| GraphError::NodeNotFound(current_node.clone()))?
                .clone();
            let node_kind = compiled
                .graph()
                .nodes
                .get(&current_node)
                .map(|spec| spec.kind.clone())
                .unwrap_or_default();

            let before = self.store.read(handle).await?;
            let outcome = self.invoke_with_retry(&node, &before, cancel, &current_node).await;

            let failed = outcome.is_err();
            let result = match outcome {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.store
                        .record_change(&self.config.agent_id, &format!("node:{current_node}:error"), &before, &before)
                        .await?;
                    if self.config.checkpoint_policy.should_checkpoint(iteration_count, &node_kind, true) {
                        last_snapshot_id = self.snapshot(handle, "on_error").await.ok();
                    }
                    return Err(err);
                }
            };

            let after = self.store.apply_patch(handle, &result.patch).await?;
            self.store
                .record_change(&self.config.agent_id, &format!("node:{current_node}"), &before, &after)
                .await?;

            iteration_count += 1;

            let mut iteration_patch = serde_json::Map::new();
            iteration_patch.insert(ITERATION_COUNT_KEY.to_string(), Value::from(iteration_count));
            let after = self.store.apply_patch(handle, &Value::Object(iteration_patch)).await?;

            if self.config.checkpoint_policy.should_checkpoint(iteration_count, &node_kind, failed) {
                last_snapshot_id = self.snapshot(handle, "node_boundary").await.ok();
            }

            let next = match &result.next_override {
                Some(next) => Some(next.clone()),
                None => compiled.next_node(&current_node, &after),
            };

            match next {
                Some(next_id) => {
                    let mut cursor_patch = serde_json::Map::new();
                    cursor_patch.insert(CURRENT_NODE_KEY.to_string(), Value::String(next_id.clone()));
                    self.store.apply_patch(handle, &Value::Object(cursor_patch)).await?;
                    current_node = next_id;
                }
                None => {
                    return Ok(ExecutionResult {
                        final_state: after,
                        iteration_count,
                        last_snapshot_id,
                    })
                }
            }
        }
    }

    async fn snapshot(&self, handle: &StateHandle, description: &str) -> Result<String> {
        let id = self
            .store
            .snapshot(handle, &self.config.workflow_id, &self.config.thread_id, Some(description.to_string()))
            .await?;
        Ok(id.to_string())
    }

    async fn invoke_with_retry(
        &self,
        node: &Arc<dyn crate::node::Node>,
        state: &Value,
        cancel: &CancelToken,
        node_id: &str,
    ) -> Result<crate::node::NodeOutcome> {
        let policy = &self.config.retry_policy;
        let mut attempts = 0usize;

        loop {
            attempts += 1;
            match node.execute(state, &self.deps, cancel).await {
                Ok(outcome) => {
                    if attempts > 1 {
                        debug!(node = node_id, attempts, "node succeeded after retry");
                    }
                    return Ok(outcome);
                }
                Err(err) => {
                    if err.kind() == ErrorKind::Permanent || attempts >= policy.max_attempts {
                        error!(node = node_id, attempts, error = %err, "node failed permanently");
                        return Err(err);
                    }
                    let delay = calculate_delay(policy, attempts);
                    warn!(node = node_id, attempts, delay_ms = delay.as_millis(), error = %err, "node failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

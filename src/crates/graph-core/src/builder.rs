//! Fluent graph construction and compilation (§4.2), grounded on the teacher's
//! `StateGraph` builder (`add_node`/`add_edge`/`add_conditional_edge`/`set_entry`/
//! `compile()`), narrowed to the spec's registry-instantiated node kinds rather than
//! the teacher's inline executor closures.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::graph::{ConditionalCase, Edge, Graph, NodeId, NodeSpec, RouteFn as NodeRouteFn};
use crate::node::{Node, NodeRegistry};
use crate::spec::WorkflowSpec;

pub use crate::graph::RouteFn;

/// Fluent builder for a [`Graph`], mirroring the teacher's `StateGraph`.
pub struct GraphBuilder {
    graph: Graph,
    route_fns: HashMap<String, NodeRouteFn>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            graph: Graph {
                name: name.into(),
                entry_point: String::new(),
                nodes: HashMap::new(),
                edges: Vec::new(),
            },
            route_fns: HashMap::new(),
        }
    }

    /// Starts a builder pre-populated from a resolved [`WorkflowSpec`].
    pub fn from_spec(spec: WorkflowSpec) -> Self {
        Self { graph: spec.into_graph(), route_fns: HashMap::new() }
    }

    pub fn add_node(&mut self, id: impl Into<NodeId>, kind: impl Into<String>, config: Value) -> &mut Self {
        self.graph.nodes.insert(id.into(), NodeSpec { kind: kind.into(), config });
        self
    }

    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> &mut Self {
        self.graph.edges.push(Edge::Simple { from: from.into(), to: to.into() });
        self
    }

    pub fn add_conditional_edge(
        &mut self,
        from: impl Into<NodeId>,
        cases: Vec<ConditionalCase>,
        default: impl Into<NodeId>,
    ) -> &mut Self {
        self.graph.edges.push(Edge::Conditional { from: from.into(), cases, default: default.into() });
        self
    }

    /// Registers a flexible edge and the route function that resolves its
    /// intermediate label; `route_fn` here is the name under which the function was
    /// registered via [`Self::register_route_fn`].
    pub fn add_flexible_edge(
        &mut self,
        from: impl Into<NodeId>,
        route_fn: impl Into<String>,
        path_map: HashMap<String, NodeId>,
    ) -> &mut Self {
        self.graph.edges.push(Edge::Flexible { from: from.into(), route_fn: route_fn.into(), path_map });
        self
    }

    pub fn register_route_fn(&mut self, name: impl Into<String>, route_fn: NodeRouteFn) -> &mut Self {
        self.route_fns.insert(name.into(), route_fn);
        self
    }

    pub fn set_entry(&mut self, node: impl Into<NodeId>) -> &mut Self {
        self.graph.entry_point = node.into();
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Validates the graph and instantiates every declared node through `registry`,
    /// producing an executable [`CompiledGraph`].
    pub fn compile(self, registry: &NodeRegistry) -> Result<CompiledGraph> {
        self.graph
            .validate()
            .map_err(|errors| GraphError::Validation(errors.join("; ")))?;

        let mut nodes = HashMap::new();
        for (id, spec) in &self.graph.nodes {
            let node = registry.instantiate(&spec.kind, &spec.config)?;
            nodes.insert(id.clone(), node);
        }

        for edge in &self.graph.edges {
            if let Edge::Flexible { route_fn, .. } = edge {
                if !self.route_fns.contains_key(route_fn) {
                    return Err(GraphError::Configuration(format!(
                        "no route function registered for '{route_fn}'"
                    )));
                }
            }
        }

        Ok(CompiledGraph {
            graph: self.graph,
            nodes,
            route_fns: self.route_fns,
        })
    }
}

/// An executable graph: validated structure, instantiated nodes, and resolved
/// route functions for flexible edges.
pub struct CompiledGraph {
    pub(crate) graph: Graph,
    pub(crate) nodes: HashMap<NodeId, Arc<dyn Node>>,
    pub(crate) route_fns: HashMap<String, NodeRouteFn>,
}

impl CompiledGraph {
    pub fn entry_point(&self) -> &NodeId {
        &self.graph.entry_point
    }

    pub fn node(&self, id: &str) -> Option<&Arc<dyn Node>> {
        self.nodes.get(id)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn route_fn(&self, name: &str) -> Option<&NodeRouteFn> {
        self.route_fns.get(name)
    }

    /// Evaluates the outgoing edge(s) from `node_id` against `state`, returning the
    /// next node id, or `None` if `node_id` has no outgoing edge (implicit terminal).
    pub fn next_node(&self, node_id: &str, state: &Value) -> Option<NodeId> {
        let edge = self.graph.edges.iter().find(|e| e.from() == node_id)?;
        match edge {
            Edge::Simple { to, .. } => Some(to.clone()),
            Edge::Conditional { cases, default, .. } => {
                for case in cases {
                    if case.when.evaluate(state) {
                        return Some(case.to.clone());
                    }
                }
                Some(default.clone())
            }
            Edge::Flexible { route_fn, path_map, .. } => {
                let route_fn = self.route_fns.get(route_fn)?;
                let label = route_fn(state);
                path_map.get(&label).cloned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::node::{Node, NodeDeps, NodeOutcome};
    use async_trait::async_trait;
    use serde_json::json;

    struct Noop;

    #[async_trait]
    impl Node for Noop {
        async fn execute(&self, _state: &Value, _deps: &NodeDeps, _cancel: &CancelToken) -> Result<NodeOutcome> {
            Ok(NodeOutcome::patch(json!({})))
        }
    }

    fn registry() -> NodeRegistry {
        let mut r = NodeRegistry::new();
        r.register("noop", Arc::new(|_cfg: &Value| Ok(Arc::new(Noop) as Arc<dyn Node>)));
        r
    }

    #[test]
    fn compile_succeeds_for_valid_linear_graph() {
        let mut builder = GraphBuilder::new("g");
        builder
            .add_node("start", "noop", json!({}))
            .add_node("end", "noop", json!({}))
            .add_edge("start", "end")
            .set_entry("start");

        let compiled = builder.compile(&registry()).unwrap();
        assert_eq!(compiled.entry_point(), "start");
        assert_eq!(compiled.next_node("start", &json!({})), Some("end".to_string()));
    }

    #[test]
    fn compile_fails_on_dangling_edge() {
        let mut builder = GraphBuilder::new("g");
        builder.add_node("start", "noop", json!({})).add_edge("start", "missing").set_entry("start");

        assert!(builder.compile(&registry()).is_err());
    }

    #[test]
    fn conditional_edge_resolves_via_predicate() {
        let mut builder = GraphBuilder::new("g");
        builder
            .add_node("verify", "noop", json!({}))
            .add_node("finalize", "noop", json!({}))
            .add_node("correct", "noop", json!({}))
            .add_conditional_edge(
                "verify",
                vec![ConditionalCase {
                    when: crate::graph::Predicate::Eq { path: "verdict".to_string(), value: json!("pass") },
                    to: "finalize".to_string(),
                }],
                "correct",
            )
            .set_entry("verify");

        let compiled = builder.compile(&registry()).unwrap();
        assert_eq!(compiled.next_node("verify", &json!({"verdict": "pass"})), Some("finalize".to_string()));
        assert_eq!(compiled.next_node("verify", &json!({"verdict": "fail"})), Some("correct".to_string()));
    }
}

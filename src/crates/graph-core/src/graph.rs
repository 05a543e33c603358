//! The graph data model: nodes, edges, and routing predicates, plus structural
//! validation (§4.2).
//!
//! Grounded on the teacher's `langgraph-core/src/graph.rs` (`NodeId` alias,
//! `Graph::{add_node,add_edge,add_conditional_edge,validate}`), narrowed to the
//! spec's declarative YAML shape rather than the teacher's closure-based
//! `NodeExecutor`/`ReducerFn` type aliases.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type NodeId = String;

/// A node's declared kind and configuration, as authored in a workflow spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    #[serde(default)]
    pub config: Value,
}

/// A routing predicate evaluated against workflow state for conditional edges.
///
/// `all`/`any` read `path` as an array and test every/some element against `value`;
/// every other op reads `path` as a scalar. This reading was chosen to keep the
/// predicate schema flat (no nested predicate lists) since the spec gives no
/// recursive grammar for combining sub-predicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    Eq { path: String, value: Value },
    Gt { path: String, value: Value },
    Contains { path: String, value: Value },
    Exists { path: String },
    All { path: String, value: Value },
    Any { path: String, value: Value },
}

impl Predicate {
    /// Resolves a dotted path (`a.b.c`) against a JSON value.
    fn resolve<'a>(state: &'a Value, path: &str) -> Option<&'a Value> {
        let mut current = state;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current)
    }

    pub fn evaluate(&self, state: &Value) -> bool {
        match self {
            Predicate::Eq { path, value } => Self::resolve(state, path) == Some(value),
            Predicate::Gt { path, value } => match (Self::resolve(state, path), value.as_f64()) {
                (Some(found), Some(rhs)) => found.as_f64().map(|lhs| lhs > rhs).unwrap_or(false),
                _ => false,
            },
            Predicate::Contains { path, value } => match Self::resolve(state, path) {
                Some(Value::Array(items)) => items.contains(value),
                Some(Value::String(s)) => value.as_str().map(|v| s.contains(v)).unwrap_or(false),
                _ => false,
            },
            Predicate::Exists { path } => Self::resolve(state, path).is_some(),
            Predicate::All { path, value } => match Self::resolve(state, path) {
                Some(Value::Array(items)) => items.iter().all(|item| item == value),
                _ => false,
            },
            Predicate::Any { path, value } => match Self::resolve(state, path) {
                Some(Value::Array(items)) => items.iter().any(|item| item == value),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalCase {
    pub when: Predicate,
    pub to: NodeId,
}

/// An edge between two nodes, resolved at routing time against the post-node state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edge {
    Simple {
        from: NodeId,
        to: NodeId,
    },
    Conditional {
        from: NodeId,
        cases: Vec<ConditionalCase>,
        default: NodeId,
    },
    /// A named route function resolves an intermediate label, which is then looked
    /// up in `path_map` to get the next node id.
    Flexible {
        from: NodeId,
        route_fn: String,
        path_map: HashMap<String, NodeId>,
    },
}

impl Edge {
    pub fn from(&self) -> &NodeId {
        match self {
            Edge::Simple { from, .. } => from,
            Edge::Conditional { from, .. } => from,
            Edge::Flexible { from, .. } => from,
        }
    }

    /// Every node id this edge can resolve to, used for validation/reachability.
    pub fn possible_targets(&self) -> Vec<&NodeId> {
        match self {
            Edge::Simple { to, .. } => vec![to],
            Edge::Conditional { cases, default, .. } => {
                let mut targets: Vec<&NodeId> = cases.iter().map(|c| &c.to).collect();
                targets.push(default);
                targets
            }
            Edge::Flexible { path_map, .. } => path_map.values().collect(),
        }
    }
}

/// The graph structure: declared nodes, edges, and entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub name: String,
    pub entry_point: NodeId,
    pub nodes: HashMap<NodeId, NodeSpec>,
    pub edges: Vec<Edge>,
}

/// Route function registered for `Edge::Flexible` resolution: given post-node state,
/// returns the intermediate label to look up in the edge's `path_map`.
pub type RouteFn = std::sync::Arc<dyn Fn(&Value) -> String + Send + Sync>;

impl Graph {
    /// Validates structure, aggregating every problem found rather than failing on
    /// the first: entry point exists, every edge endpoint is a declared node, and
    /// every non-terminal node is reachable from the entry point.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !self.nodes.contains_key(&self.entry_point) {
            errors.push(format!("entry_point '{}' is not a declared node", self.entry_point));
        }

        for edge in &self.edges {
            if !self.nodes.contains_key(edge.from()) {
                errors.push(format!("edge references undeclared source node '{}'", edge.from()));
            }
            for target in edge.possible_targets() {
                if !self.nodes.contains_key(target) {
                    errors.push(format!("edge references undeclared target node '{}'", target));
                }
            }
        }

        if errors.is_empty() {
            let reachable = self.reachable_from_entry();
            for (id, spec) in &self.nodes {
                if spec.kind != "end" && !reachable.contains(id) {
                    errors.push(format!("node '{id}' is unreachable from entry_point"));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn reachable_from_entry(&self) -> HashSet<&NodeId> {
        let mut adjacency: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
        for edge in &self.edges {
            adjacency.entry(edge.from()).or_default().extend(edge.possible_targets());
        }

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(&self.entry_point);
        visited.insert(&self.entry_point);

        while let Some(node) = queue.pop_front() {
            if let Some(targets) = adjacency.get(node) {
                for target in targets {
                    if visited.insert(*target) {
                        queue.push_back(target);
                    }
                }
            }
        }
        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(kind: &str) -> NodeSpec {
        NodeSpec { kind: kind.to_string(), config: json!({}) }
    }

    #[test]
    fn valid_linear_graph_passes_validation() {
        let mut nodes = HashMap::new();
        nodes.insert("start".to_string(), node("start"));
        nodes.insert("mid".to_string(), node("llm"));
        nodes.insert("end".to_string(), node("end"));

        let graph = Graph {
            name: "g".to_string(),
            entry_point: "start".to_string(),
            nodes,
            edges: vec![
                Edge::Simple { from: "start".to_string(), to: "mid".to_string() },
                Edge::Simple { from: "mid".to_string(), to: "end".to_string() },
            ],
        };
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn unreachable_node_is_reported() {
        let mut nodes = HashMap::new();
        nodes.insert("start".to_string(), node("start"));
        nodes.insert("orphan".to_string(), node("llm"));

        let graph = Graph {
            name: "g".to_string(),
            entry_point: "start".to_string(),
            nodes,
            edges: vec![],
        };
        let errors = graph.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("orphan")));
    }

    #[test]
    fn dangling_edge_endpoint_is_reported() {
        let mut nodes = HashMap::new();
        nodes.insert("start".to_string(), node("start"));

        let graph = Graph {
            name: "g".to_string(),
            entry_point: "start".to_string(),
            nodes,
            edges: vec![Edge::Simple { from: "start".to_string(), to: "missing".to_string() }],
        };
        let errors = graph.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("missing")));
    }

    #[test]
    fn eq_predicate_matches_dotted_path() {
        let state = json!({"verdict": "pass"});
        let p = Predicate::Eq { path: "verdict".to_string(), value: json!("pass") };
        assert!(p.evaluate(&state));
    }

    #[test]
    fn any_predicate_checks_array_membership() {
        let state = json!({"tags": ["a", "b"]});
        let p = Predicate::Any { path: "tags".to_string(), value: json!("b") };
        assert!(p.evaluate(&state));
    }
}

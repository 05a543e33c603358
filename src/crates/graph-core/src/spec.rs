//! Workflow spec parsing and `inherits_from` resolution (§4.2, §6).
//!
//! Specs are authored as YAML and parsed via `serde_yaml`, following the teacher's
//! `YamlGraphDef::{from_str,from_file}` pattern. A [`WorkflowSpecLoader`] resolves
//! `inherits_from` through a pluggable [`SpecSource`] (filesystem today, injectable
//! for other sources later, mirroring the teacher's own YAML-loader extension point).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::graph::{Edge, Graph, NodeId, NodeSpec};

/// A workflow spec as authored (before inheritance is resolved).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub inherits_from: Option<String>,
    pub entry_point: NodeId,
    pub nodes: HashMap<NodeId, NodeSpec>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowSpec {
    pub fn from_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Deep-merges `child` over `self` (the parent): child node entries override
    /// parent entries with the same key, new child keys are added; edges append
    /// (parent edges, then child edges) since the spec names no replacement
    /// syntax for lists.
    fn merged_with_child(self, child: WorkflowSpec) -> WorkflowSpec {
        let mut nodes = self.nodes;
        for (id, spec) in child.nodes {
            nodes.insert(id, spec);
        }

        let mut edges = self.edges;
        edges.extend(child.edges);

        WorkflowSpec {
            name: child.name,
            version: child.version.or(self.version),
            inherits_from: None,
            entry_point: child.entry_point,
            nodes,
            edges,
        }
    }

    pub fn into_graph(self) -> Graph {
        Graph {
            name: self.name,
            entry_point: self.entry_point,
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

/// Where workflow specs come from. `inherits_from` values are resolved as names
/// through this trait, decoupling spec storage from the loader's merge logic.
pub trait SpecSource: Send + Sync {
    fn load(&self, name: &str) -> Result<WorkflowSpec>;
}

/// Loads specs as `{dir}/{name}.yaml`.
pub struct FilesystemSpecSource {
    dir: PathBuf,
}

impl FilesystemSpecSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SpecSource for FilesystemSpecSource {
    fn load(&self, name: &str) -> Result<WorkflowSpec> {
        let path = self.dir.join(format!("{name}.yaml"));
        WorkflowSpec::from_file(path)
    }
}

/// Resolves a named spec's full `inherits_from` chain into one merged
/// [`WorkflowSpec`], detecting cycles.
pub struct WorkflowSpecLoader {
    source: Box<dyn SpecSource>,
}

impl WorkflowSpecLoader {
    pub fn new(source: impl SpecSource + 'static) -> Self {
        Self { source: Box::new(source) }
    }

    pub fn load_resolved(&self, name: &str) -> Result<WorkflowSpec> {
        let mut visited = Vec::new();
        self.resolve(name, &mut visited)
    }

    fn resolve(&self, name: &str, visited: &mut Vec<String>) -> Result<WorkflowSpec> {
        if visited.contains(&name.to_string()) {
            visited.push(name.to_string());
            return Err(GraphError::InheritanceCycle(visited.join(" -> ")));
        }
        visited.push(name.to_string());

        let spec = self.source.load(name)?;
        match &spec.inherits_from {
            Some(parent_name) => {
                let parent = self.resolve(parent_name, visited)?;
                Ok(parent.merged_with_child(spec))
            }
            None => Ok(spec),
        }
    }
}

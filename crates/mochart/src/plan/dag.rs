//! Registry-wide dependency graph.
//!
//! [`Registry::resolve_dependencies`] answers "in which order do I run
//! these ids". This module answers "is the registry as a whole sound":
//! it builds a [petgraph](https://docs.rs/petgraph/) graph over every
//! registered definition, with an edge from each dependency to its
//! dependent, and topologically sorts it.
//!
//! # Example
//!
//! ```
//! use mochart::plan::{dag::DependencyGraph, Registry};
//!
//! let registry = Registry::with_builtins();
//! let graph = DependencyGraph::from_registry(&registry);
//! let order = graph.topological_order().unwrap();
//!
//! let ema = order.iter().position(|id| id == "ema").unwrap();
//! let macd = order.iter().position(|id| id == "macd").unwrap();
//! assert!(ema < macd);
//! ```

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::error::{Error, Result};
use crate::plan::Registry;

/// Directed graph of definition ids; edges run dependency → dependent.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_indices: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph of every registered definition.
    ///
    /// Nodes are added in id order so the resulting topological order is
    /// stable. Dependencies that are not registered are skipped; use
    /// [`Registry::missing_dependencies`] to find them.
    #[must_use]
    pub fn from_registry(registry: &Registry) -> Self {
        let mut ids: Vec<&str> = registry.ids().collect();
        ids.sort_unstable();

        let mut graph = Self {
            graph: DiGraph::with_capacity(ids.len(), ids.len()),
            node_indices: HashMap::with_capacity(ids.len()),
        };
        for id in &ids {
            graph.add_node(id);
        }
        for id in &ids {
            if let Some(def) = registry.get(id) {
                for dep in def.dependencies() {
                    graph.add_dependency(id, dep);
                }
            }
        }
        graph
    }

    /// Adds a node; a no-op if `id` already exists.
    pub fn add_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&index) = self.node_indices.get(id) {
            return index;
        }
        let index = self.graph.add_node(id.to_owned());
        self.node_indices.insert(id.to_owned(), index);
        index
    }

    /// Records that `dependent` must run after `dependency`.
    ///
    /// Returns `false` if either node is missing.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) -> bool {
        let (Some(&from), Some(&to)) = (
            self.node_indices.get(dependency),
            self.node_indices.get(dependent),
        ) else {
            return false;
        };
        self.graph.add_edge(from, to, ());
        true
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns `true` if `id` is a node.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.node_indices.contains_key(id)
    }

    /// Returns a valid execution order of every node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CircularDependency`] naming a node on a cycle.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|idx| self.graph[idx].clone()).collect())
            .map_err(|cycle| Error::CircularDependency {
                id: self.graph[cycle.node_id()].clone(),
            })
    }

    /// Ids that `id` directly depends on.
    pub fn dependencies(&self, id: &str) -> Option<impl Iterator<Item = &str>> {
        let idx = self.node_indices.get(id)?;
        Some(
            self.graph
                .edges_directed(*idx, Direction::Incoming)
                .map(|edge| self.graph[edge.source()].as_str()),
        )
    }

    /// Ids that directly depend on `id`.
    pub fn dependents(&self, id: &str) -> Option<impl Iterator<Item = &str>> {
        let idx = self.node_indices.get(id)?;
        Some(
            self.graph
                .edges_directed(*idx, Direction::Outgoing)
                .map(|edge| self.graph[edge.target()].as_str()),
        )
    }
}

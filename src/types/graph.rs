//! Graph snapshot container type

use serde::{Deserialize, Serialize};

use super::{GraphEdge, GraphNode};

/// Whole-graph view at one point in time.
///
/// Snapshots are shared as `Arc<GraphSnapshot>` and replaced wholesale;
/// edits always produce a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl GraphSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a snapshot with nodes and edges
    pub fn with_data(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Self { nodes, edges }
    }

    /// Check if the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub(crate) fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub(crate) fn edge_index(&self, id: &str) -> Option<usize> {
        self.edges.iter().position(|e| e.id == id)
    }

    /// Edges with the given node as source or target
    pub fn edges_touching<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a GraphEdge> {
        self.edges.iter().filter(move |e| e.touches(node_id))
    }

    /// Number of nodes and edges carrying at least one conflict annotation
    pub fn conflicted_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.has_conflicts()).count()
            + self.edges.iter().filter(|e| !e.conflicts.is_empty()).count()
    }
}

//! Dangling edge and duplicate id detection

use std::collections::HashSet;
use std::fmt;

use crate::types::GraphSnapshot;

/// Problem found in a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// Edge endpoint does not name a node in the snapshot
    DanglingEdge { edge_id: String, missing_node: String },
    DuplicateNode(String),
    DuplicateEdge(String),
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityIssue::DanglingEdge {
                edge_id,
                missing_node,
            } => write!(f, "edge '{}' references missing node '{}'", edge_id, missing_node),
            IntegrityIssue::DuplicateNode(id) => write!(f, "duplicate node id '{}'", id),
            IntegrityIssue::DuplicateEdge(id) => write!(f, "duplicate edge id '{}'", id),
        }
    }
}

/// Collect every integrity issue in the snapshot
pub fn check_integrity(snapshot: &GraphSnapshot) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();

    let mut node_ids = HashSet::new();
    for node in &snapshot.nodes {
        if !node_ids.insert(node.id.as_str()) {
            issues.push(IntegrityIssue::DuplicateNode(node.id.clone()));
        }
    }

    let mut edge_ids = HashSet::new();
    for edge in &snapshot.edges {
        if !edge_ids.insert(edge.id.as_str()) {
            issues.push(IntegrityIssue::DuplicateEdge(edge.id.clone()));
        }
        for endpoint in [&edge.source, &edge.target] {
            if !node_ids.contains(endpoint.as_str()) {
                issues.push(IntegrityIssue::DanglingEdge {
                    edge_id: edge.id.clone(),
                    missing_node: endpoint.clone(),
                });
            }
        }
    }

    issues
}

//! Structural application and inversion of graph operations

use serde_json::{Map, Value};

use crate::error::{SyncError, SyncResult};
use crate::types::{GraphEdge, GraphNode, GraphOperation, GraphSnapshot};

/// State captured at apply time that undoes an operation
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Inverse {
    RemoveNode(String),
    RestoreNode { index: usize, node: GraphNode },
    ReplaceNodeProperties { id: String, properties: Map<String, Value> },
    RemoveEdge(String),
    RestoreEdge { index: usize, edge: GraphEdge },
    ReplaceEdgeProperties { id: String, properties: Map<String, Value> },
}

fn missing_node(id: &str) -> SyncError {
    SyncError::invalid(format!("node '{}' not in snapshot", id))
}

fn missing_edge(id: &str) -> SyncError {
    SyncError::invalid(format!("edge '{}' not in snapshot", id))
}

fn merge_into(target: &mut Map<String, Value>, delta: &Map<String, Value>) {
    for (key, value) in delta {
        target.insert(key.clone(), value.clone());
    }
}

/// Derive the next snapshot and the inverse of `op`.
///
/// Deleting a node leaves its edges in place; only `DeleteEdge` removes edges.
pub(crate) fn apply(
    snapshot: &GraphSnapshot,
    op: &GraphOperation,
) -> SyncResult<(GraphSnapshot, Inverse)> {
    let mut next = snapshot.clone();

    let inverse = match op {
        GraphOperation::CreateNode { node } => {
            if snapshot.node(&node.id).is_some() {
                return Err(SyncError::invalid(format!("node '{}' already exists", node.id)));
            }
            next.nodes.push(node.clone());
            Inverse::RemoveNode(node.id.clone())
        }
        GraphOperation::UpdateNode { id, properties } => {
            let index = snapshot.node_index(id).ok_or_else(|| missing_node(id))?;
            let node = &mut next.nodes[index];
            let before = node.properties.clone();
            merge_into(&mut node.properties, properties);
            Inverse::ReplaceNodeProperties {
                id: id.clone(),
                properties: before,
            }
        }
        GraphOperation::DeleteNode { id } => {
            let index = snapshot.node_index(id).ok_or_else(|| missing_node(id))?;
            let node = next.nodes.remove(index);
            Inverse::RestoreNode { index, node }
        }
        GraphOperation::CreateEdge { edge } => {
            if snapshot.edge(&edge.id).is_some() {
                return Err(SyncError::invalid(format!("edge '{}' already exists", edge.id)));
            }
            for endpoint in [&edge.source, &edge.target] {
                if snapshot.node(endpoint).is_none() {
                    return Err(missing_node(endpoint));
                }
            }
            next.edges.push(edge.clone());
            Inverse::RemoveEdge(edge.id.clone())
        }
        GraphOperation::UpdateEdge { id, properties } => {
            let index = snapshot.edge_index(id).ok_or_else(|| missing_edge(id))?;
            let edge = &mut next.edges[index];
            let before = edge.properties.clone();
            merge_into(&mut edge.properties, properties);
            Inverse::ReplaceEdgeProperties {
                id: id.clone(),
                properties: before,
            }
        }
        GraphOperation::DeleteEdge { id } => {
            let index = snapshot.edge_index(id).ok_or_else(|| missing_edge(id))?;
            let edge = next.edges.remove(index);
            Inverse::RestoreEdge { index, edge }
        }
    };

    Ok((next, inverse))
}

/// Apply a captured inverse
pub(crate) fn revert(snapshot: &GraphSnapshot, inverse: &Inverse) -> SyncResult<GraphSnapshot> {
    let mut next = snapshot.clone();

    match inverse {
        Inverse::RemoveNode(id) => {
            let index = snapshot.node_index(id).ok_or_else(|| missing_node(id))?;
            next.nodes.remove(index);
        }
        Inverse::RestoreNode { index, node } => {
            let at = (*index).min(next.nodes.len());
            next.nodes.insert(at, node.clone());
        }
        Inverse::ReplaceNodeProperties { id, properties } => {
            let index = snapshot.node_index(id).ok_or_else(|| missing_node(id))?;
            next.nodes[index].properties = properties.clone();
        }
        Inverse::RemoveEdge(id) => {
            let index = snapshot.edge_index(id).ok_or_else(|| missing_edge(id))?;
            next.edges.remove(index);
        }
        Inverse::RestoreEdge { index, edge } => {
            let at = (*index).min(next.edges.len());
            next.edges.insert(at, edge.clone());
        }
        Inverse::ReplaceEdgeProperties { id, properties } => {
            let index = snapshot.edge_index(id).ok_or_else(|| missing_edge(id))?;
            next.edges[index].properties = properties.clone();
        }
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeStatus;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_update_is_shallow_merge() {
        let snapshot = GraphSnapshot::with_data(
            vec![GraphNode::new("a", NodeStatus::Both)
                .with_property("name", json!("Alice"))
                .with_property("age", json!(30))],
            vec![],
        );
        let op = GraphOperation::UpdateNode {
            id: "a".to_string(),
            properties: props(json!({"age": 31, "city": "Oslo"})),
        };

        let (next, inverse) = apply(&snapshot, &op).unwrap();
        let node = next.node("a").unwrap();
        assert_eq!(node.properties["name"], "Alice");
        assert_eq!(node.properties["age"], 31);
        assert_eq!(node.properties["city"], "Oslo");

        // Inverse restores old values and drops keys the update introduced
        let restored = revert(&next, &inverse).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_delete_restores_original_position() {
        let snapshot = GraphSnapshot::with_data(
            vec![
                GraphNode::new("a", NodeStatus::Both),
                GraphNode::new("b", NodeStatus::Both),
                GraphNode::new("c", NodeStatus::Both),
            ],
            vec![],
        );
        let (next, inverse) =
            apply(&snapshot, &GraphOperation::DeleteNode { id: "b".to_string() }).unwrap();
        assert_eq!(next.node_count(), 2);
        assert_eq!(revert(&next, &inverse).unwrap(), snapshot);
    }

    #[test]
    fn test_edge_requires_endpoints() {
        let snapshot =
            GraphSnapshot::with_data(vec![GraphNode::new("a", NodeStatus::Both)], vec![]);
        let op = GraphOperation::CreateEdge {
            edge: GraphEdge::new("e1", "a", "ghost", "KNOWS"),
        };
        assert!(matches!(
            apply(&snapshot, &op),
            Err(SyncError::InvalidOperation(msg)) if msg.contains("ghost")
        ));
    }

    #[test]
    fn test_duplicate_create_rejected() {
        let snapshot =
            GraphSnapshot::with_data(vec![GraphNode::new("a", NodeStatus::Both)], vec![]);
        let op = GraphOperation::CreateNode {
            node: GraphNode::new("a", NodeStatus::Staging),
        };
        assert!(apply(&snapshot, &op).is_err());
    }
}

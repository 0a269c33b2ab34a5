//! Local graph edit operations

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{GraphEdge, GraphNode};

/// Optimistic edit applied on top of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GraphOperation {
    CreateNode {
        node: GraphNode,
    },

    /// Shallow-merges `properties` into the node's property map
    UpdateNode {
        id: String,
        properties: Map<String, Value>,
    },

    DeleteNode {
        id: String,
    },

    CreateEdge {
        edge: GraphEdge,
    },

    /// Shallow-merges `properties` into the edge's property map
    UpdateEdge {
        id: String,
        properties: Map<String, Value>,
    },

    DeleteEdge {
        id: String,
    },
}

impl GraphOperation {
    /// Id of the node or edge the operation targets
    pub fn target_id(&self) -> &str {
        match self {
            GraphOperation::CreateNode { node } => &node.id,
            GraphOperation::CreateEdge { edge } => &edge.id,
            GraphOperation::UpdateNode { id, .. }
            | GraphOperation::DeleteNode { id }
            | GraphOperation::UpdateEdge { id, .. }
            | GraphOperation::DeleteEdge { id } => id,
        }
    }

    /// Wire tag of the operation
    pub fn kind(&self) -> &'static str {
        match self {
            GraphOperation::CreateNode { .. } => "CREATE_NODE",
            GraphOperation::UpdateNode { .. } => "UPDATE_NODE",
            GraphOperation::DeleteNode { .. } => "DELETE_NODE",
            GraphOperation::CreateEdge { .. } => "CREATE_EDGE",
            GraphOperation::UpdateEdge { .. } => "UPDATE_EDGE",
            GraphOperation::DeleteEdge { .. } => "DELETE_EDGE",
        }
    }
}

//! Data types for the merge sync engine
//!
//! This module contains the graph, conflict and operation records shared by
//! every component.

mod conflict;
mod edge;
mod graph;
mod node;
mod operation;

pub use conflict::{Conflict, Severity};
pub use edge::GraphEdge;
pub use graph::GraphSnapshot;
pub use node::{GraphNode, NodeStatus};
pub use operation::GraphOperation;

/// Property key holding the server's raw status tag
pub const STATUS_KEY: &str = "_status";

/// Property key holding the server's raw type tag
pub const TYPE_KEY: &str = "_type";

/// Check if a property key is reserved for server tags
pub fn is_reserved_key(key: &str) -> bool {
    key == STATUS_KEY || key == TYPE_KEY
}

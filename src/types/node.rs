//! Node types for the merge graph

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which side of the merge a record comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Staging,
    Prod,
    #[default]
    Both,
}

impl NodeStatus {
    /// Map a server status tag; unknown tags are treated as present on both sides
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "staging" | "new" | "added" => NodeStatus::Staging,
            "prod" | "production" | "removed" => NodeStatus::Prod,
            _ => NodeStatus::Both,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Staging => "staging",
            NodeStatus::Prod => "prod",
            NodeStatus::Both => "both",
        }
    }
}

/// Node in a graph snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub status: NodeStatus,
    /// Ids of conflicts referencing this node, filled in by reconciliation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
}

impl GraphNode {
    /// Create a node with no properties
    pub fn new(id: impl Into<String>, status: NodeStatus) -> Self {
        Self {
            id: id.into(),
            labels: Vec::new(),
            properties: Map::new(),
            status,
            conflicts: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_from_tag() {
        assert_eq!(NodeStatus::from_tag("staging"), NodeStatus::Staging);
        assert_eq!(NodeStatus::from_tag("PRODUCTION"), NodeStatus::Prod);
        assert_eq!(NodeStatus::from_tag("both"), NodeStatus::Both);
        assert_eq!(NodeStatus::from_tag("modified"), NodeStatus::Both);
    }

    #[test]
    fn test_labels_stay_a_set() {
        let node = GraphNode::new("a", NodeStatus::Staging)
            .with_label("Person")
            .with_label("Person")
            .with_label("Employee");
        assert_eq!(node.labels, vec!["Person", "Employee"]);
    }

    #[test]
    fn test_conflicts_omitted_when_empty() {
        let node = GraphNode::new("a", NodeStatus::Prod).with_property("name", json!("Alice"));
        let json = serde_json::to_value(&node).unwrap();
        assert!(json.get("conflicts").is_none());
        assert_eq!(json["status"], "prod");
    }
}

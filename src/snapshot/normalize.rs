//! Normalisation of raw server records into snapshot types

use std::collections::HashSet;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::SyncResult;
use crate::types::{
    is_reserved_key, Conflict, GraphEdge, GraphNode, GraphSnapshot, NodeStatus, STATUS_KEY, TYPE_KEY,
};

/// Normalised visualization payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Visualization {
    pub snapshot: GraphSnapshot,
    /// Conflicts delivered inline with the graph, if any
    pub conflicts: Vec<Conflict>,
    pub summary: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawVisualization {
    #[serde(default)]
    nodes: Vec<RawNode>,
    #[serde(default)]
    edges: Vec<RawEdge>,
    #[serde(default)]
    conflicts: Option<Vec<Conflict>>,
    #[serde(default)]
    summary: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(deserialize_with = "id_string")]
    id: String,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    status: Option<String>,
    #[serde(rename = "type", default)]
    node_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEdge {
    #[serde(default, deserialize_with = "opt_id_string")]
    id: Option<String>,
    #[serde(alias = "from", deserialize_with = "id_string")]
    source: String,
    #[serde(alias = "to", deserialize_with = "id_string")]
    target: String,
    #[serde(rename = "type", alias = "relationship", default)]
    edge_type: String,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    status: Option<String>,
}

/// Graph databases hand out numeric ids; keep everything as strings
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("invalid id: {}", other))),
    }
}

fn opt_id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(de::Error::custom(format!("invalid id: {}", other))),
    }
}

/// Turn the `data` object of a visualization response into a snapshot.
///
/// `null` (nothing computed yet) yields an empty snapshot.
pub fn normalize(data: Value) -> SyncResult<Visualization> {
    if data.is_null() {
        return Ok(Visualization::default());
    }
    let raw: RawVisualization = serde_json::from_value(data)?;

    let nodes = raw.nodes.into_iter().map(normalize_node).collect();

    let mut seen = HashSet::new();
    let edges = raw
        .edges
        .into_iter()
        .map(|edge| {
            let mut edge = normalize_edge(edge);
            // Synthesised ids collide for parallel edges
            let base = edge.id.clone();
            let mut n = 1;
            while !seen.insert(edge.id.clone()) {
                edge.id = format!("{}#{}", base, n);
                n += 1;
            }
            edge
        })
        .collect();

    Ok(Visualization {
        snapshot: GraphSnapshot::with_data(nodes, edges),
        conflicts: raw.conflicts.unwrap_or_default(),
        summary: raw.summary,
    })
}

fn normalize_node(raw: RawNode) -> GraphNode {
    let mut labels: Vec<String> = Vec::with_capacity(raw.labels.len() + 1);
    for label in raw.labels.into_iter().chain(raw.label) {
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    let mut properties = raw.properties.unwrap_or_default();
    let status = tag_properties(&mut properties, raw.status, raw.node_type);

    GraphNode {
        id: raw.id,
        labels,
        properties,
        status,
        conflicts: Vec::new(),
    }
}

fn normalize_edge(raw: RawEdge) -> GraphEdge {
    let mut properties = raw.properties.unwrap_or_default();
    let status = tag_properties(
        &mut properties,
        raw.status,
        Some(raw.edge_type.clone()).filter(|t| !t.is_empty()),
    );
    let id = raw
        .id
        .unwrap_or_else(|| format!("{}-{}-{}", raw.source, raw.edge_type, raw.target));

    GraphEdge {
        id,
        source: raw.source,
        target: raw.target,
        edge_type: raw.edge_type,
        properties,
        status,
        conflicts: Vec::new(),
    }
}

/// Preserve server tags under reserved keys and map the status
fn tag_properties(
    properties: &mut Map<String, Value>,
    status: Option<String>,
    type_tag: Option<String>,
) -> NodeStatus {
    let mapped = status
        .as_deref()
        .map(NodeStatus::from_tag)
        .unwrap_or_default();
    // Reserved keys only ever carry the tags of the current payload
    properties.retain(|key, _| !is_reserved_key(key));
    if let Some(status) = status {
        properties.insert(STATUS_KEY.to_string(), Value::String(status));
    }
    if let Some(type_tag) = type_tag {
        properties.insert(TYPE_KEY.to_string(), Value::String(type_tag));
    }
    mapped
}

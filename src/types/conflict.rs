//! Conflict records reported by the merge backend

use serde::{Deserialize, Serialize};

/// Conflict severity; unrecognised server values map to `Unknown`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    #[default]
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Unknown => "unknown",
        }
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Unknown,
        }
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        value.as_str().to_string()
    }
}

/// Disagreement between staging and production for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: String,
    #[serde(rename = "entityId", alias = "entity_id")]
    pub entity_id: String,
    #[serde(rename = "conflictType", alias = "conflict_type", default)]
    pub conflict_type: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    /// Other nodes or edges the conflict involves
    #[serde(
        rename = "relatedEntities",
        alias = "related_entities",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub related_entities: Vec<String>,
    #[serde(
        rename = "resolutionStatus",
        alias = "resolution_status",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub resolution_status: Option<String>,
    #[serde(
        rename = "resolutionConfidence",
        alias = "resolution_confidence",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub resolution_confidence: Option<f64>,
}

impl Conflict {
    pub fn new(id: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_id: entity_id.into(),
            conflict_type: String::new(),
            severity: Severity::Unknown,
            description: String::new(),
            related_entities: Vec::new(),
            resolution_status: None,
            resolution_confidence: None,
        }
    }

    pub fn with_related(mut self, entity_id: impl Into<String>) -> Self {
        self.related_entities.push(entity_id.into());
        self
    }

    /// Whether the conflict references the given node or edge
    pub fn references(&self, entity_id: &str) -> bool {
        self.entity_id == entity_id || self.related_entities.iter().any(|e| e == entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_conflict() {
        let json = r#"{
            "id": "c1",
            "entity_id": "n1",
            "conflict_type": "property_mismatch",
            "severity": "HIGH",
            "description": "name differs",
            "resolutionStatus": "pending"
        }"#;
        let conflict: Conflict = serde_json::from_str(json).unwrap();
        assert_eq!(conflict.entity_id, "n1");
        assert_eq!(conflict.severity, Severity::High);
        assert_eq!(conflict.resolution_status.as_deref(), Some("pending"));
        assert!(conflict.resolution_confidence.is_none());
    }

    #[test]
    fn test_unknown_severity() {
        let conflict: Conflict =
            serde_json::from_str(r#"{"id":"c","entityId":"n","severity":"blocker"}"#).unwrap();
        assert_eq!(conflict.severity, Severity::Unknown);
    }

    #[test]
    fn test_references_related_entities() {
        let conflict = Conflict::new("c1", "n1").with_related("e7");
        assert!(conflict.references("n1"));
        assert!(conflict.references("e7"));
        assert!(!conflict.references("n2"));
    }
}

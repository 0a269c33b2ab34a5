//! Conflict annotation of snapshots

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::types::{Conflict, GraphSnapshot};

/// Annotate every node and edge with the ids of the conflicts referencing it.
///
/// A conflict references an entity through its `entity_id` or its related
/// entities. The result depends only on the two inputs: annotations already
/// present on `snapshot` are replaced, never merged.
pub fn annotate(snapshot: &GraphSnapshot, conflicts: &[Conflict]) -> GraphSnapshot {
    let mut index: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for conflict in conflicts {
        for entity in std::iter::once(&conflict.entity_id).chain(&conflict.related_entities) {
            index
                .entry(entity.as_str())
                .or_default()
                .insert(conflict.id.as_str());
        }
    }

    let lookup = |id: &str| -> Vec<String> {
        index
            .get(id)
            .map(|ids| ids.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default()
    };

    let mut annotated = snapshot.clone();
    for node in &mut annotated.nodes {
        node.conflicts = lookup(&node.id);
    }
    for edge in &mut annotated.edges {
        edge.conflicts = lookup(&edge.id);
    }
    annotated
}

/// Combine separately fetched conflicts with inline ones; fetched wins by id
pub fn merge_conflicts(inline: &[Conflict], fetched: &[Conflict]) -> Vec<Conflict> {
    let fetched_ids: HashSet<&str> = fetched.iter().map(|c| c.id.as_str()).collect();
    fetched
        .iter()
        .chain(inline.iter().filter(|c| !fetched_ids.contains(c.id.as_str())))
        .cloned()
        .collect()
}

//! Memoized graph projection.
//!
//! The graph is rebuilt only when the content that feeds it changes. The
//! cache key is a blake3 digest over every field [`build_graph`] reads.

use std::sync::{Arc, Mutex};

use crate::conflict::Conflict;
use crate::document::Document;
use crate::graph::builder::{build_graph, LayoutConfig, RelationshipGraph};

/// Stable digest of the graph inputs.
#[must_use]
pub fn graph_fingerprint(documents: &[Document], conflicts: &[Conflict]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();

    // Length-prefix every field so adjacent values cannot run together.
    let mut field = |bytes: &[u8]| {
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    };

    field(b"documents");
    for doc in documents {
        field(doc.id.as_str().as_bytes());
        field(doc.title.as_bytes());
    }
    field(b"conflicts");
    for c in conflicts {
        field(c.id.as_str().as_bytes());
        field(c.document_ids[0].as_str().as_bytes());
        field(c.document_ids[1].as_str().as_bytes());
        field(&[u8::from(c.is_unresolved())]);
    }

    hasher.finalize()
}

/// Holds the most recent projection.
#[derive(Debug)]
pub struct GraphCache {
    layout: LayoutConfig,
    latest: Mutex<Option<(blake3::Hash, Arc<RelationshipGraph>)>>,
}

impl GraphCache {
    /// Creates an empty cache for the given layout.
    #[must_use]
    pub fn new(layout: LayoutConfig) -> Self {
        Self {
            layout,
            latest: Mutex::new(None),
        }
    }

    /// Layout used for projections.
    #[must_use]
    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Returns the cached graph when the inputs are unchanged, otherwise
    /// rebuilds it.
    pub fn get_or_build(&self, documents: &[Document], conflicts: &[Conflict]) -> Arc<RelationshipGraph> {
        let key = graph_fingerprint(documents, conflicts);

        let mut latest = match self.latest.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some((cached_key, graph)) = latest.as_ref() {
            if *cached_key == key {
                return Arc::clone(graph);
            }
        }

        let graph = Arc::new(build_graph(documents, conflicts, &self.layout));
        tracing::debug!(nodes = graph.nodes.len(), edges = graph.edges.len(), "graph rebuilt");
        *latest = Some((key, Arc::clone(&graph)));
        graph
    }

    /// Drops the cached projection.
    pub fn invalidate(&self) {
        match self.latest.lock() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::{CandidateConflict, ConflictId, Resolution, Severity};

    fn docs() -> Vec<Document> {
        vec![Document::new("a", "A", "x"), Document::new("b", "B", "y")]
    }

    fn conflicts() -> Vec<Conflict> {
        vec![Conflict::from_candidate(
            ConflictId::from("c1"),
            CandidateConflict {
                document_ids: ["a".into(), "b".into()],
                document_titles: ["A".to_string(), "B".to_string()],
                excerpts: [String::new(), String::new()],
                explanation: "e".to_string(),
                severity: Severity::Low,
            },
        )]
    }

    #[test]
    fn unchanged_inputs_hit_the_cache() {
        let cache = GraphCache::new(LayoutConfig::default());
        let first = cache.get_or_build(&docs(), &conflicts());
        let second = cache.get_or_build(&docs(), &conflicts());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn content_only_edits_do_not_rebuild() {
        let cache = GraphCache::new(LayoutConfig::default());
        let first = cache.get_or_build(&docs(), &conflicts());
        let mut edited = docs();
        edited[0].content = "changed".to_string();
        let second = cache.get_or_build(&edited, &conflicts());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn resolution_change_rebuilds() {
        let cache = GraphCache::new(LayoutConfig::default());
        let first = cache.get_or_build(&docs(), &conflicts());
        assert_eq!(first.edges[0].unresolved_conflict_count, 1);

        let mut resolved = conflicts();
        resolved[0].apply_resolution(Resolution::AcceptSecond);
        let second = cache.get_or_build(&docs(), &resolved);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.edges[0].unresolved_conflict_count, 0);
    }

    #[test]
    fn invalidate_forces_rebuild() {
        let cache = GraphCache::new(LayoutConfig::default());
        let first = cache.get_or_build(&docs(), &conflicts());
        cache.invalidate();
        let second = cache.get_or_build(&docs(), &conflicts());
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
    }

    #[test]
    fn fingerprint_separates_fields() {
        let a = vec![Document::new("ab", "c", "")];
        let b = vec![Document::new("a", "bc", "")];
        assert_ne!(graph_fingerprint(&a, &[]), graph_fingerprint(&b, &[]));
    }
}

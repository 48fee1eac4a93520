//! Relationship graph projection.
//!
//! [`build_graph`] is a pure function of the documents and conflicts: one
//! node per document laid out on a circle, one edge per unordered pair that
//! has at least one conflict, and a per-node conflict tally.

use std::collections::{HashMap, HashSet};
use std::f64::consts::{FRAC_PI_2, TAU};

use serde::{Deserialize, Serialize};

use crate::conflict::{Conflict, PairKey};
use crate::document::{Document, DocumentId};
use crate::graph::geometry::Point;

/// Circular layout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Radius of the layout circle.
    pub radius: f64,
    /// Center of the layout circle in graph space.
    pub center: Point,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            radius: 200.0,
            center: Point::ORIGIN,
        }
    }
}

impl LayoutConfig {
    /// Position of document `index` out of `count`.
    ///
    /// The first document sits at the top; the rest follow clockwise (y grows
    /// downwards).
    #[must_use]
    pub fn position(&self, index: usize, count: usize) -> Point {
        #[allow(clippy::cast_precision_loss)]
        let angle = index as f64 * (TAU / count as f64) - FRAC_PI_2;
        Point::new(
            self.center.x + self.radius * angle.cos(),
            self.center.y + self.radius * angle.sin(),
        )
    }
}

/// A document drawn as a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// The document id.
    pub id: DocumentId,
    /// The document title.
    pub label: String,
    /// Layout position in graph space.
    pub position: Point,
}

/// Aggregated conflicts between two documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Displayed source, taken from the first conflict seen for the pair.
    pub source: DocumentId,
    /// Displayed target.
    pub target: DocumentId,
    /// Number of conflicts on this pair that are still unresolved.
    pub unresolved_conflict_count: usize,
}

impl GraphEdge {
    /// Canonical pair key.
    #[must_use]
    pub fn key(&self) -> PairKey {
        PairKey::new(&self.source, &self.target)
    }

    /// True if the edge touches `id`.
    #[must_use]
    pub fn touches(&self, id: &DocumentId) -> bool {
        self.source == *id || self.target == *id
    }

    /// The endpoint opposite `id`, if the edge touches it.
    #[must_use]
    pub fn opposite(&self, id: &DocumentId) -> Option<&DocumentId> {
        if self.source == *id {
            Some(&self.target)
        } else if self.target == *id {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Nodes, edges and per-node tallies derived from the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipGraph {
    /// One node per document, in store order.
    pub nodes: Vec<GraphNode>,
    /// One edge per conflicting pair, in order of first appearance.
    pub edges: Vec<GraphEdge>,
    /// Conflicts of any status referencing each document.
    pub per_node_conflict_count: HashMap<DocumentId, usize>,
}

impl RelationshipGraph {
    /// Looks up a node.
    #[must_use]
    pub fn node(&self, id: &DocumentId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == *id)
    }

    /// Looks up the edge between two documents, in either order.
    #[must_use]
    pub fn edge(&self, a: &DocumentId, b: &DocumentId) -> Option<&GraphEdge> {
        let key = PairKey::new(a, b);
        self.edges.iter().find(|e| e.key() == key)
    }

    /// Total conflicts referencing `id` (0 for unknown ids).
    #[must_use]
    pub fn conflict_count(&self, id: &DocumentId) -> usize {
        self.per_node_conflict_count.get(id).copied().unwrap_or(0)
    }

    /// Documents directly connected to `id` by an edge.
    #[must_use]
    pub fn neighbors(&self, id: &DocumentId) -> HashSet<DocumentId> {
        self.edges
            .iter()
            .filter_map(|e| e.opposite(id))
            .cloned()
            .collect()
    }

    /// True when there is nothing to draw.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Projects documents and conflicts into a relationship graph.
#[must_use]
pub fn build_graph(documents: &[Document], conflicts: &[Conflict], layout: &LayoutConfig) -> RelationshipGraph {
    if documents.is_empty() {
        return RelationshipGraph::default();
    }

    let count = documents.len();
    let nodes: Vec<GraphNode> = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| GraphNode {
            id: doc.id.clone(),
            label: doc.title.clone(),
            position: layout.position(i, count),
        })
        .collect();

    let mut per_node_conflict_count: HashMap<DocumentId, usize> =
        documents.iter().map(|d| (d.id.clone(), 0)).collect();

    let mut edges: Vec<GraphEdge> = Vec::new();
    let mut edge_index: HashMap<PairKey, usize> = HashMap::new();

    for conflict in conflicts {
        let [a, b] = &conflict.document_ids;

        let idx = *edge_index.entry(conflict.pair_key()).or_insert_with(|| {
            edges.push(GraphEdge {
                source: a.clone(),
                target: b.clone(),
                unresolved_conflict_count: 0,
            });
            edges.len() - 1
        });
        if conflict.is_unresolved() {
            edges[idx].unresolved_conflict_count += 1;
        }

        for id in [a, b] {
            *per_node_conflict_count.entry(id.clone()).or_insert(0) += 1;
        }
    }

    RelationshipGraph {
        nodes,
        edges,
        per_node_conflict_count,
    }
}

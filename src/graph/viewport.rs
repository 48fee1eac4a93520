//! Interactive viewport over the relationship graph.
//!
//! Holds the pan/zoom transform and the hover state. All operations are
//! synchronous; a gesture is fully applied before the next input arrives.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::document::DocumentId;
use crate::error::ValidationError;
use crate::graph::builder::{GraphEdge, RelationshipGraph};
use crate::graph::geometry::{Point, Transform};

/// Zoom behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Scale multiplier per wheel notch.
    pub zoom_factor: f64,
    /// Lower bound for `k`.
    pub min_scale: f64,
    /// Upper bound for `k`.
    pub max_scale: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            zoom_factor: 1.1,
            min_scale: 0.2,
            max_scale: 5.0,
        }
    }
}

impl ViewportConfig {
    /// Checks the bounds are usable.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` for a non-positive scale
    /// bound, inverted bounds, or a zoom factor that is not above 1.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if !(self.min_scale > 0.0 && self.min_scale <= self.max_scale && self.max_scale.is_finite()) {
            return Err(ValidationError::InvalidConfig {
                reason: format!(
                    "scale bounds must satisfy 0 < min <= max (got {} and {})",
                    self.min_scale, self.max_scale
                ),
            });
        }
        if !(self.zoom_factor > 1.0 && self.zoom_factor.is_finite()) {
            return Err(ValidationError::InvalidConfig {
                reason: format!("zoom_factor must be greater than 1 (got {})", self.zoom_factor),
            });
        }
        Ok(self)
    }
}

/// Tooltip shown next to a hovered node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tooltip {
    /// Lines in display order: the label, then the conflict total.
    pub lines: Vec<String>,
}

/// Pan, zoom and hover state.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportController {
    config: ViewportConfig,
    transform: Transform,
    hovered: Option<DocumentId>,
    is_panning: bool,
    pan_anchor: Point,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

impl ViewportController {
    /// Creates a controller at the identity transform.
    #[must_use]
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            transform: Transform::IDENTITY,
            hovered: None,
            is_panning: false,
            pan_anchor: Point::ORIGIN,
        }
    }

    /// Current transform.
    #[must_use]
    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Replaces the transform, clamping the scale into bounds.
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = Transform {
            k: transform.k.clamp(self.config.min_scale, self.config.max_scale),
            ..transform
        };
    }

    /// True between `begin_pan` and `end_pan`.
    #[must_use]
    pub fn is_panning(&self) -> bool {
        self.is_panning
    }

    /// Starts a drag at `pointer`.
    pub fn begin_pan(&mut self, pointer: Point) {
        self.pan_anchor = pointer;
        self.is_panning = true;
    }

    /// Moves the view by the pointer delta since the last anchor. Ignored
    /// unless a pan is in progress.
    pub fn continue_pan(&mut self, pointer: Point) {
        if !self.is_panning {
            return;
        }
        let delta = pointer - self.pan_anchor;
        self.transform.x += delta.x;
        self.transform.y += delta.y;
        self.pan_anchor = pointer;
    }

    /// Ends the drag.
    pub fn end_pan(&mut self) {
        self.is_panning = false;
    }

    /// Zooms around `pointer` so the graph point under it stays put.
    ///
    /// A positive `wheel_delta` (scrolling down) zooms out.
    pub fn zoom_at(&mut self, pointer: Point, wheel_delta: f64) {
        let Transform { x, y, k } = self.transform;
        let scaled = if wheel_delta > 0.0 {
            k / self.config.zoom_factor
        } else {
            k * self.config.zoom_factor
        };
        let new_k = scaled.clamp(self.config.min_scale, self.config.max_scale);
        let ratio = new_k / k;

        self.transform = Transform {
            x: pointer.x - (pointer.x - x) * ratio,
            y: pointer.y - (pointer.y - y) * ratio,
            k: new_k,
        };
    }

    /// Screen to graph coordinates.
    #[must_use]
    pub fn screen_to_graph(&self, screen: Point) -> Point {
        self.transform.to_graph(screen)
    }

    /// Graph to screen coordinates.
    #[must_use]
    pub fn graph_to_screen(&self, graph: Point) -> Point {
        self.transform.to_screen(graph)
    }

    /// Sets or clears the hovered node.
    pub fn hover(&mut self, node: Option<DocumentId>) {
        self.hovered = node;
    }

    /// The hovered node, if any.
    #[must_use]
    pub fn hovered(&self) -> Option<&DocumentId> {
        self.hovered.as_ref()
    }

    /// The hovered id, if it names a node of `graph`. A hover left over
    /// from an older graph counts as no hover.
    fn hovered_in<'a>(&'a self, graph: &RelationshipGraph) -> Option<&'a DocumentId> {
        self.hovered.as_ref().filter(|id| graph.node(id).is_some())
    }

    /// The hovered node plus its direct neighbours. Empty when nothing is
    /// hovered or the hovered id is not in `graph`.
    #[must_use]
    pub fn active_set(&self, graph: &RelationshipGraph) -> HashSet<DocumentId> {
        let Some(hovered) = self.hovered_in(graph) else {
            return HashSet::new();
        };
        let mut active = graph.neighbors(hovered);
        active.insert(hovered.clone());
        active
    }

    /// Whether a node is drawn at full strength. Everything is active while
    /// nothing in `graph` is hovered.
    #[must_use]
    pub fn is_node_active(&self, graph: &RelationshipGraph, id: &DocumentId) -> bool {
        self.hovered_in(graph).is_none() || self.active_set(graph).contains(id)
    }

    /// Whether an edge is drawn at full strength: it must touch the hovered
    /// node.
    #[must_use]
    pub fn is_edge_active(&self, graph: &RelationshipGraph, edge: &GraphEdge) -> bool {
        self.hovered_in(graph).map_or(true, |h| edge.touches(h))
    }

    /// Tooltip for the hovered node.
    #[must_use]
    pub fn tooltip(&self, graph: &RelationshipGraph) -> Option<Tooltip> {
        let hovered = self.hovered_in(graph)?;
        let node = graph.node(hovered)?;
        Some(Tooltip {
            lines: vec![
                node.label.clone(),
                format!("Total Conflicts: {}", graph.conflict_count(hovered)),
            ],
        })
    }

    /// Back to the identity transform, no hover, no pan.
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}

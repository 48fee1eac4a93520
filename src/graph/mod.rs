//! Relationship graph: projection, memoization and viewport.
//!
//! ```text
//! documents + conflicts ──> build_graph ──> RelationshipGraph ──> ViewportController
//!                               ↑
//!                          GraphCache (blake3 fingerprint)
//! ```

mod builder;
mod cache;
mod geometry;
mod viewport;

pub use builder::{build_graph, GraphEdge, GraphNode, LayoutConfig, RelationshipGraph};
pub use cache::{graph_fingerprint, GraphCache};
pub use geometry::{Point, Transform};
pub use viewport::{Tooltip, ViewportConfig, ViewportController};

//! # dissonance - Conflict Lifecycle & Relationship Graph Engine
//!
//! dissonance tracks textual contradictions across a growing set of
//! documents. An external analyzer compares documents pairwise; dissonance
//! decides which pairs to compare, merges the findings without duplicates or
//! stale records, manages their resolution state, and projects everything
//! into an interactive relationship graph.
//!
//! ## Core Concepts
//!
//! - **Document**: A titled piece of text, identified by an opaque id
//! - **Conflict**: A contradiction between two documents, with severity and resolution state
//! - **Stale purge**: Re-analyzing a pair replaces every earlier conflict for that pair
//! - **Relationship graph**: Documents as nodes, one edge per conflicting pair
//! - **Viewport**: Pan/zoom transform and hover state over the graph
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dissonance::{Document, Workspace};
//!
//! let workspace = Workspace::builder(Arc::new(my_analyzer)).open()?;
//! workspace
//!     .analyze_batch(vec![
//!         Document::new("d1", "Handbook", "Remote work is allowed."),
//!         Document::new("d2", "Policy", "All staff work on site."),
//!     ])
//!     .await?;
//!
//! let conflict = &workspace.conflicts()?[0];
//! workspace.resolve(conflict.id.as_str(), "accept_first")?;
//!
//! let graph = workspace.graph()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod conflict;
pub mod document;
pub mod error;
pub mod history;
pub mod ids;
pub mod profile;
pub mod time;

// Storage and analysis
pub mod analyzer;
pub mod orchestrator;
pub mod storage;

// Graph, reporting, persistence
pub mod config;
pub mod graph;
pub mod persistence;
pub mod report;
pub mod workspace;

// Re-export primary types at crate root for convenience
pub use analyzer::Analyzer;
pub use config::DissonanceConfig;
pub use conflict::{
    CandidateConflict, Conflict, ConflictId, ConflictStatus, DocumentPair, PairKey, Resolution, Severity,
};
pub use document::{Document, DocumentId, SourceFile, TextFile};
pub use error::{AnalyzerError, DissonanceError, DissonanceResult, PersistenceError, ValidationError};
pub use graph::{
    build_graph, GraphEdge, GraphNode, LayoutConfig, Point, RelationshipGraph, Tooltip, Transform,
    ViewportConfig, ViewportController,
};
pub use history::{HistoryEvent, HistoryEventType};
pub use ids::{IdGenerator, SequentialIds, UuidGenerator};
pub use orchestrator::{generate_pairs, AnalysisOutcome, Orchestrator};
pub use persistence::{FileSnapshotStore, InMemorySnapshotStore, Snapshot, SnapshotPort};
pub use profile::UserProfile;
pub use report::{Report, ReportOptions, SortKey};
pub use storage::{InMemoryRecordStore, RecordStore, ResolveOutcome, StorageError, StoreExport};
pub use time::{Clock, FixedClock, SystemClock};
pub use workspace::{Workspace, WorkspaceBuilder};

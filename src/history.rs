//! Append-only activity history.
//!
//! Every mutating operation leaves a [`HistoryEvent`] behind. The log is
//! kept newest first and is never edited.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEventType {
    /// An analysis run began.
    AnalysisStarted,
    /// An analysis run merged its results.
    AnalysisComplete,
    /// An analysis run failed; nothing was merged.
    AnalysisError,
    /// A conflict was resolved or ignored.
    ConflictResolved,
    /// A document's content was replaced.
    DocumentSaved,
    /// The user profile changed.
    ProfileUpdated,
    /// A report was exported.
    ReportGenerated,
}

impl fmt::Display for HistoryEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AnalysisStarted => "analysis_started",
            Self::AnalysisComplete => "analysis_complete",
            Self::AnalysisError => "analysis_error",
            Self::ConflictResolved => "conflict_resolved",
            Self::DocumentSaved => "document_saved",
            Self::ProfileUpdated => "profile_updated",
            Self::ReportGenerated => "report_generated",
        };
        f.write_str(s)
    }
}

/// One entry of the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Unique identifier.
    pub id: String,
    /// Event kind.
    #[serde(rename = "type")]
    pub event_type: HistoryEventType,
    /// Human-readable details.
    pub details: String,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

impl HistoryEvent {
    /// Creates an event.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        event_type: HistoryEventType,
        details: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            event_type,
            details: details.into(),
            timestamp,
        }
    }
}

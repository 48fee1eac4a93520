//! Conflict types for tracking contradictions between documents.
//!
//! A conflict ties an excerpt in one document to a contradicting excerpt in
//! another. Conflicts are created in bulk by the analysis orchestrator and
//! afterwards only change through resolution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::DocumentId;
use crate::error::ValidationError;

/// Unique identifier for a conflict.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictId(String);

impl ConflictId {
    /// Wraps an externally generated token.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConflictId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConflictId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Severity assigned by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Direct, material contradiction.
    High,
    /// Noticeable inconsistency.
    Medium,
    /// Minor wording or scope difference.
    Low,
}

impl Severity {
    /// Sort rank, most severe first.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

impl FromStr for Severity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(ValidationError::UnknownValue {
                field: "severity",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
            Self::Low => write!(f, "Low"),
        }
    }
}

/// The status of a conflict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    /// No decision has been made.
    #[default]
    Unresolved,
    /// One side was accepted.
    Resolved,
    /// The user chose to ignore the conflict.
    Ignored,
}

impl ConflictStatus {
    /// Sort rank, open work first.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Unresolved => 0,
            Self::Resolved => 1,
            Self::Ignored => 2,
        }
    }
}

impl fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved => write!(f, "unresolved"),
            Self::Resolved => write!(f, "resolved"),
            Self::Ignored => write!(f, "ignored"),
        }
    }
}

impl FromStr for ConflictStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "unresolved" => Ok(Self::Unresolved),
            "resolved" => Ok(Self::Resolved),
            "ignored" => Ok(Self::Ignored),
            other => Err(ValidationError::UnknownValue {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// How a conflict was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The first document's excerpt is authoritative.
    #[serde(alias = "accept_doc1")]
    AcceptFirst,
    /// The second document's excerpt is authoritative.
    #[serde(alias = "accept_doc2")]
    AcceptSecond,
    /// Not a real conflict.
    Ignore,
}

impl Resolution {
    /// The status implied by this resolution.
    #[must_use]
    pub const fn status(self) -> ConflictStatus {
        match self {
            Self::AcceptFirst | Self::AcceptSecond => ConflictStatus::Resolved,
            Self::Ignore => ConflictStatus::Ignored,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AcceptFirst => write!(f, "accept_first"),
            Self::AcceptSecond => write!(f, "accept_second"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

impl FromStr for Resolution {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "accept_first" | "accept_doc1" => Ok(Self::AcceptFirst),
            "accept_second" | "accept_doc2" => Ok(Self::AcceptSecond),
            "ignore" => Ok(Self::Ignore),
            other => Err(ValidationError::InvalidResolution {
                value: other.to_string(),
            }),
        }
    }
}

/// Canonical, order-insensitive key for a pair of documents.
///
/// The smaller id is always stored first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey(DocumentId, DocumentId);

impl PairKey {
    /// Builds the canonical key for two ids.
    #[must_use]
    pub fn new(a: &DocumentId, b: &DocumentId) -> Self {
        if a <= b {
            Self(a.clone(), b.clone())
        } else {
            Self(b.clone(), a.clone())
        }
    }

    /// The lexicographically smaller id.
    #[must_use]
    pub fn low(&self) -> &DocumentId {
        &self.0
    }

    /// The lexicographically larger id.
    #[must_use]
    pub fn high(&self) -> &DocumentId {
        &self.1
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.0, self.1)
    }
}

/// An unordered pair of distinct documents, keeping the order it was built in
/// for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentPair {
    /// First document in display order.
    pub first: DocumentId,
    /// Second document in display order.
    pub second: DocumentId,
}

impl DocumentPair {
    /// Creates a pair of two distinct documents.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::SelfPair` when both ids are equal.
    pub fn new(first: DocumentId, second: DocumentId) -> Result<Self, ValidationError> {
        if first == second {
            return Err(ValidationError::SelfPair {
                id: first.to_string(),
            });
        }
        Ok(Self { first, second })
    }

    /// Canonical key for storage and lookup.
    #[must_use]
    pub fn key(&self) -> PairKey {
        PairKey::new(&self.first, &self.second)
    }

    /// True if both pairs name the same two documents, in any order.
    #[must_use]
    pub fn matches(&self, a: &DocumentId, b: &DocumentId) -> bool {
        (self.first == *a && self.second == *b) || (self.first == *b && self.second == *a)
    }
}

impl fmt::Display for DocumentPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.first, self.second)
    }
}

/// A conflict as reported by the analyzer, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateConflict {
    /// The two documents involved.
    pub document_ids: [DocumentId; 2],
    /// Display titles, parallel to `document_ids`.
    pub document_titles: [String; 2],
    /// Quoted text, parallel to `document_ids`.
    pub excerpts: [String; 2],
    /// Why the excerpts contradict.
    pub explanation: String,
    /// Analyzer-assigned severity.
    pub severity: Severity,
}

/// A stored conflict between two documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Unique identifier for this conflict.
    pub id: ConflictId,

    /// The two documents involved, in the analyzer's order.
    pub document_ids: [DocumentId; 2],

    /// Display titles, parallel to `document_ids`.
    pub document_titles: [String; 2],

    /// Quoted text, parallel to `document_ids`.
    pub excerpts: [String; 2],

    /// Why the excerpts contradict.
    pub explanation: String,

    /// Analyzer-assigned severity. Never changes after creation.
    pub severity: Severity,

    /// Current status.
    #[serde(default)]
    pub status: ConflictStatus,

    /// How it was resolved (if resolved or ignored).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

impl Conflict {
    /// Promotes an analyzer candidate to an unresolved conflict.
    #[must_use]
    pub fn from_candidate(id: ConflictId, candidate: CandidateConflict) -> Self {
        Self {
            id,
            document_ids: candidate.document_ids,
            document_titles: candidate.document_titles,
            excerpts: candidate.excerpts,
            explanation: candidate.explanation,
            severity: candidate.severity,
            status: ConflictStatus::Unresolved,
            resolution: None,
        }
    }

    /// Canonical pair key.
    #[must_use]
    pub fn pair_key(&self) -> PairKey {
        PairKey::new(&self.document_ids[0], &self.document_ids[1])
    }

    /// True if this conflict belongs to the given unordered pair.
    #[must_use]
    pub fn belongs_to(&self, pair: &DocumentPair) -> bool {
        pair.matches(&self.document_ids[0], &self.document_ids[1])
    }

    /// True if either side references the document.
    #[must_use]
    pub fn references(&self, id: &DocumentId) -> bool {
        self.document_ids.iter().any(|d| d == id)
    }

    /// Returns true if the conflict is still open.
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        self.status == ConflictStatus::Unresolved
    }

    /// Applies a resolution. Returns false when it was already in place.
    pub fn apply_resolution(&mut self, resolution: Resolution) -> bool {
        if self.resolution == Some(resolution) && self.status == resolution.status() {
            return false;
        }
        self.status = resolution.status();
        self.resolution = Some(resolution);
        true
    }

    /// Checks the status/resolution correspondence.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        match (self.status, self.resolution) {
            (ConflictStatus::Unresolved, None) => true,
            (status, Some(resolution)) => resolution.status() == status,
            _ => false,
        }
    }
}

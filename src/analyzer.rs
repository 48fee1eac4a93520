//! The external contradiction analyzer.
//!
//! Detection itself is opaque: an [`Analyzer`] receives two documents and
//! reports zero or more candidate conflicts. Ids, status and resolution are
//! assigned later, when the orchestrator merges the candidates.

use async_trait::async_trait;

use crate::conflict::{CandidateConflict, DocumentPair};
use crate::document::Document;
use crate::error::AnalyzerError;

/// Compares two documents and reports contradictions.
///
/// Implementations must not retry internally; a failed call fails the whole
/// analysis run it belongs to.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze one pair of documents.
    async fn analyze(
        &self,
        first: &Document,
        second: &Document,
    ) -> Result<Vec<CandidateConflict>, AnalyzerError>;
}

/// Checks analyzer output for one pair and fills in missing titles.
///
/// # Errors
///
/// Returns `AnalyzerError::Malformed` when a candidate names a different
/// pair of documents or has no explanation.
pub fn validate_candidates(
    pair: &DocumentPair,
    first: &Document,
    second: &Document,
    candidates: Vec<CandidateConflict>,
) -> Result<Vec<CandidateConflict>, AnalyzerError> {
    candidates
        .into_iter()
        .map(|mut candidate| {
            let [a, b] = &candidate.document_ids;
            if !pair.matches(a, b) {
                return Err(AnalyzerError::Malformed {
                    pair: pair.to_string(),
                    reason: format!("candidate references {a} and {b}"),
                });
            }
            if candidate.explanation.trim().is_empty() {
                return Err(AnalyzerError::Malformed {
                    pair: pair.to_string(),
                    reason: "candidate has an empty explanation".to_string(),
                });
            }

            for (idx, id) in candidate.document_ids.iter().enumerate() {
                if candidate.document_titles[idx].trim().is_empty() {
                    let doc = if *id == first.id { first } else { second };
                    candidate.document_titles[idx].clone_from(&doc.title);
                }
            }
            Ok(candidate)
        })
        .collect()
}

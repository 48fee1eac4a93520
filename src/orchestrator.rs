//! Pairwise analysis orchestration.
//!
//! Decides which document pairs to analyze, fans the analyzer calls out
//! concurrently, and merges the results into the record store in a single
//! purge-and-insert once every call has settled ("gather all, then commit").
//!
//! Only one run may be in flight. A second request while one is running is
//! rejected with `ValidationError::AnalysisInProgress`, never queued.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;

use crate::analyzer::{validate_candidates, Analyzer};
use crate::conflict::{CandidateConflict, Conflict, ConflictId, DocumentPair};
use crate::document::{Document, DocumentId};
use crate::error::{AnalyzerError, DissonanceError, DissonanceResult, ValidationError};
use crate::history::{HistoryEvent, HistoryEventType};
use crate::ids::IdGenerator;
use crate::storage::RecordStore;
use crate::time::Clock;

/// Generates the batch-mode pair set.
///
/// Bipartite pairs come first (each new document, in ingestion order,
/// against each existing document, in store order), followed by every pair
/// within the new batch in index order `i < j`. For `N` new and `M`
/// existing documents this is exactly `N*M + N*(N-1)/2` pairs.
#[must_use]
pub fn generate_pairs(new_docs: &[Document], existing: &[Document]) -> Vec<DocumentPair> {
    let n = new_docs.len();
    let mut pairs = Vec::with_capacity(n * existing.len() + n * n.saturating_sub(1) / 2);

    for fresh in new_docs {
        for old in existing {
            if let Ok(pair) = DocumentPair::new(fresh.id.clone(), old.id.clone()) {
                pairs.push(pair);
            }
        }
    }

    for (i, left) in new_docs.iter().enumerate() {
        for right in &new_docs[i + 1..] {
            if let Ok(pair) = DocumentPair::new(left.id.clone(), right.id.clone()) {
                pairs.push(pair);
            }
        }
    }

    pairs
}

/// Summary of a successful analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    /// Pairs that were analyzed, in generation order.
    pub pairs: Vec<DocumentPair>,
    /// Ids of the conflicts created by this run.
    pub created: Vec<ConflictId>,
    /// Number of stale conflicts purged for these pairs.
    pub purged: usize,
}

/// Resets the in-flight flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs batch and targeted analyses against a record store.
pub struct Orchestrator {
    store: Arc<dyn RecordStore>,
    analyzer: Arc<dyn Analyzer>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    in_flight: AtomicBool,
}

impl Orchestrator {
    /// Create an orchestrator over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        analyzer: Arc<dyn Analyzer>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            analyzer,
            ids,
            clock,
            in_flight: AtomicBool::new(false),
        }
    }

    /// True while an analysis run is outstanding.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn begin_run(&self) -> Result<RunGuard<'_>, ValidationError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ValidationError::AnalysisInProgress)?;
        Ok(RunGuard(&self.in_flight))
    }

    /// Batch mode: ingest `new_docs`, then analyze them against each other
    /// and against every stored document.
    ///
    /// Documents stay ingested even when the analysis fails afterwards.
    ///
    /// # Errors
    /// - `Validation`: empty batch, fewer than two documents overall, or a run in flight
    /// - `DuplicateId`: a new document id is already taken (nothing ingested)
    /// - `Analyzer`: an analyzer call failed; no conflicts were merged
    pub async fn ingest_and_analyze(&self, new_docs: Vec<Document>) -> DissonanceResult<AnalysisOutcome> {
        let _guard = self.begin_run()?;

        if new_docs.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        let existing = self.store.documents()?;
        let total = existing.len() + new_docs.len();
        if total < 2 {
            return Err(ValidationError::NotEnoughDocuments { count: total }.into());
        }

        let pairs = generate_pairs(&new_docs, &existing);
        self.store.upsert_documents(new_docs.clone())?;
        tracing::info!(
            new = new_docs.len(),
            existing = existing.len(),
            pairs = pairs.len(),
            "batch ingested"
        );

        let lookup: HashMap<DocumentId, Document> = existing
            .into_iter()
            .chain(new_docs)
            .map(|d| (d.id.clone(), d))
            .collect();

        self.run_pairs(pairs, &lookup).await
    }

    /// Targeted mode: re-analyze exactly one pair of stored documents.
    ///
    /// # Errors
    /// - `Validation`: both ids are the same, or a run is in flight
    /// - `NotFound`: either document is unknown
    /// - `Analyzer`: the analyzer call failed; the pair's conflicts are untouched
    pub async fn analyze_pair(&self, first: &DocumentId, second: &DocumentId) -> DissonanceResult<AnalysisOutcome> {
        let _guard = self.begin_run()?;

        let pair = DocumentPair::new(first.clone(), second.clone())?;
        let mut lookup = HashMap::with_capacity(2);
        for id in [first, second] {
            let doc = self.store.document(id)?.ok_or_else(|| DissonanceError::NotFound {
                kind: "Document",
                id: id.to_string(),
            })?;
            lookup.insert(id.clone(), doc);
        }

        self.run_pairs(vec![pair], &lookup).await
    }

    fn record(&self, event_type: HistoryEventType, details: String) -> DissonanceResult<()> {
        let event = HistoryEvent::new(self.ids.new_id(), event_type, details, self.clock.now());
        self.store.append_history(event)?;
        Ok(())
    }

    async fn run_pairs(
        &self,
        pairs: Vec<DocumentPair>,
        lookup: &HashMap<DocumentId, Document>,
    ) -> DissonanceResult<AnalysisOutcome> {
        self.record(
            HistoryEventType::AnalysisStarted,
            format!("Analyzing {} document pair(s)", pairs.len()),
        )?;

        let calls = pairs.iter().map(|pair| self.analyze_one(pair, lookup));
        let settled = join_all(calls).await;

        let mut candidates = Vec::new();
        for result in settled {
            match result {
                Ok(found) => candidates.extend(found),
                Err(err) => return Err(self.fail(err.into())),
            }
        }

        let conflicts: Vec<Conflict> = candidates
            .into_iter()
            .map(|c| Conflict::from_candidate(ConflictId::new(self.ids.new_id()), c))
            .collect();
        let created: Vec<ConflictId> = conflicts.iter().map(|c| c.id.clone()).collect();

        let purged = match self.store.replace_conflicts_for_pairs(&pairs, conflicts) {
            Ok(purged) => purged,
            Err(err) => return Err(self.fail(err.into())),
        };

        self.record(
            HistoryEventType::AnalysisComplete,
            format!("Analysis complete: {} new conflict(s) found", created.len()),
        )?;
        tracing::info!(pairs = pairs.len(), created = created.len(), purged, "analysis merged");

        Ok(AnalysisOutcome {
            pairs,
            created,
            purged,
        })
    }

    async fn analyze_one(
        &self,
        pair: &DocumentPair,
        lookup: &HashMap<DocumentId, Document>,
    ) -> Result<Vec<CandidateConflict>, AnalyzerError> {
        let missing = |id: &DocumentId| AnalyzerError::Malformed {
            pair: pair.to_string(),
            reason: format!("document {id} is not loaded"),
        };
        let first = lookup.get(&pair.first).ok_or_else(|| missing(&pair.first))?;
        let second = lookup.get(&pair.second).ok_or_else(|| missing(&pair.second))?;

        let raw = self.analyzer.analyze(first, second).await?;
        tracing::debug!(pair = %pair, candidates = raw.len(), "analyzer returned");
        validate_candidates(pair, first, second, raw)
    }

    /// Logs the failure as an `analysis_error` event and hands the error back.
    fn fail(&self, err: DissonanceError) -> DissonanceError {
        tracing::warn!(error = %err, "analysis run failed, nothing merged");
        if let Err(log_err) = self.record(HistoryEventType::AnalysisError, format!("Analysis failed: {err}")) {
            tracing::warn!(error = %log_err, "could not record analysis_error event");
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(ids: &[&str]) -> Vec<Document> {
        ids.iter().map(|id| Document::new(*id, *id, "")).collect()
    }

    fn as_tuples(pairs: &[DocumentPair]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|p| (p.first.to_string(), p.second.to_string()))
            .collect()
    }

    #[test]
    fn test_generate_pairs_order() {
        let pairs = generate_pairs(&docs(&["n1", "n2", "n3"]), &docs(&["e1", "e2"]));
        let expected: Vec<(String, String)> = [
            ("n1", "e1"),
            ("n1", "e2"),
            ("n2", "e1"),
            ("n2", "e2"),
            ("n3", "e1"),
            ("n3", "e2"),
            ("n1", "n2"),
            ("n1", "n3"),
            ("n2", "n3"),
        ]
        .iter()
        .map(|(a, b)| ((*a).to_string(), (*b).to_string()))
        .collect();
        assert_eq!(as_tuples(&pairs), expected);
    }

    #[test]
    fn test_generate_pairs_count_and_uniqueness() {
        for n in 0..6usize {
            for m in 0..5usize {
                let new_ids: Vec<String> = (0..n).map(|i| format!("n{i}")).collect();
                let old_ids: Vec<String> = (0..m).map(|i| format!("e{i}")).collect();
                let new_docs: Vec<Document> = new_ids.iter().map(|id| Document::new(id.as_str(), "", "")).collect();
                let old_docs: Vec<Document> = old_ids.iter().map(|id| Document::new(id.as_str(), "", "")).collect();

                let pairs = generate_pairs(&new_docs, &old_docs);
                assert_eq!(pairs.len(), n * m + n * n.saturating_sub(1) / 2);

                let keys: std::collections::HashSet<_> = pairs.iter().map(DocumentPair::key).collect();
                assert_eq!(keys.len(), pairs.len());
                assert!(pairs.iter().all(|p| p.first != p.second));
            }
        }
    }

    #[test]
    fn test_generate_pairs_is_deterministic() {
        let a = generate_pairs(&docs(&["x", "y"]), &docs(&["z"]));
        let b = generate_pairs(&docs(&["x", "y"]), &docs(&["z"]));
        assert_eq!(a, b);
    }
}

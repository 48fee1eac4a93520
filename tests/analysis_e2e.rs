//! End-to-end tests for batch and targeted analysis through the workspace.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{docs, open, CountingGate, GatedAnalyzer, Script, ScriptedAnalyzer};
use dissonance::{
    ConflictStatus, DissonanceError, DocumentPair, HistoryEventType, Resolution, ResolveOutcome, Severity,
    ValidationError,
};

fn pair(a: &str, b: &str) -> DocumentPair {
    DocumentPair::new(a.into(), b.into()).unwrap()
}

#[tokio::test]
async fn test_batch_creates_conflicts_and_history() {
    let analyzer = ScriptedAnalyzer::new();
    analyzer.set("a", "b", Script::Conflicts(vec![Severity::High, Severity::Low]));
    analyzer.set("a", "c", Script::Conflicts(vec![Severity::Medium]));
    let ws = open(analyzer.clone());

    let outcome = ws.analyze_batch(docs(&["a", "b", "c"])).await.unwrap();
    assert_eq!(outcome.pairs.len(), 3);
    assert_eq!(outcome.created.len(), 3);
    assert_eq!(outcome.purged, 0);

    let conflicts = ws.conflicts().unwrap();
    assert_eq!(conflicts.len(), 3);
    assert!(conflicts.iter().all(|c| c.status == ConflictStatus::Unresolved && c.resolution.is_none()));

    let history = ws.history().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].event_type, HistoryEventType::AnalysisComplete);
    assert_eq!(history[0].details, "Analysis complete: 3 new conflict(s) found");
    assert_eq!(history[1].event_type, HistoryEventType::AnalysisStarted);
    assert_eq!(history[1].details, "Analyzing 3 document pair(s)");
}

#[tokio::test]
async fn test_incremental_batch_only_analyzes_new_pairs() {
    let analyzer = ScriptedAnalyzer::new();
    analyzer.set("a", "b", Script::Conflicts(vec![Severity::High]));
    let ws = open(analyzer.clone());
    ws.analyze_batch(docs(&["a", "b"])).await.unwrap();
    let original = ws.conflicts().unwrap();
    analyzer.clear_calls();

    let outcome = ws.analyze_batch(docs(&["c", "d"])).await.unwrap();

    let expected = [("c", "a"), ("c", "b"), ("d", "a"), ("d", "b"), ("c", "d")];
    let got: Vec<(String, String)> = outcome
        .pairs
        .iter()
        .map(|p| (p.first.to_string(), p.second.to_string()))
        .collect();
    let expected: Vec<(String, String)> = expected
        .iter()
        .map(|(x, y)| ((*x).to_string(), (*y).to_string()))
        .collect();
    assert_eq!(got, expected);

    let mut calls = analyzer.calls();
    calls.sort();
    let mut sorted = expected;
    sorted.sort();
    assert_eq!(calls, sorted);

    // The untouched pair keeps its conflict, id and all.
    assert_eq!(ws.conflicts().unwrap(), original);
    assert_eq!(ws.documents().unwrap().len(), 4);
}

#[tokio::test]
async fn test_reanalysis_purges_stale_conflicts() {
    let analyzer = ScriptedAnalyzer::new();
    analyzer.set("a", "b", Script::Conflicts(vec![Severity::High, Severity::Medium]));
    analyzer.set("a", "c", Script::Conflicts(vec![Severity::Low]));
    let ws = open(analyzer.clone());
    ws.analyze_batch(docs(&["a", "b", "c"])).await.unwrap();

    analyzer.set("a", "b", Script::Conflicts(Vec::new()));
    let outcome = ws.analyze_pair("b", "a").await.unwrap();
    assert_eq!(outcome.purged, 2);
    assert!(outcome.created.is_empty());

    assert!(ws.store().conflicts_for_pair(&pair("a", "b")).unwrap().is_empty());
    assert_eq!(ws.store().conflicts_for_pair(&pair("a", "c")).unwrap().len(), 1);
}

#[tokio::test]
async fn test_reanalysis_replaces_resolved_conflicts() {
    let analyzer = ScriptedAnalyzer::new();
    analyzer.set("a", "b", Script::Conflicts(vec![Severity::High]));
    let ws = open(analyzer.clone());
    ws.analyze_batch(docs(&["a", "b"])).await.unwrap();
    let old = ws.conflicts().unwrap()[0].id.clone();
    ws.resolve(old.as_str(), "ignore").unwrap();

    let outcome = ws.analyze_pair("a", "b").await.unwrap();
    let conflicts = ws.conflicts().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].id, outcome.created[0]);
    assert_ne!(conflicts[0].id, old);
    assert!(conflicts[0].is_unresolved());
}

#[tokio::test]
async fn test_analyzer_failure_keeps_documents_and_merges_nothing() {
    let analyzer = ScriptedAnalyzer::new();
    analyzer.set("a", "b", Script::Conflicts(vec![Severity::High]));
    analyzer.set("b", "c", Script::Fail);
    let ws = open(analyzer.clone());

    let err = ws.analyze_batch(docs(&["a", "b", "c"])).await.unwrap_err();
    assert!(err.is_analyzer());
    assert!(err.is_retryable());

    assert_eq!(ws.documents().unwrap().len(), 3);
    assert!(ws.conflicts().unwrap().is_empty());

    let history = ws.history().unwrap();
    let kinds: Vec<HistoryEventType> = history.iter().map(|e| e.event_type).collect();
    assert_eq!(kinds, [HistoryEventType::AnalysisError, HistoryEventType::AnalysisStarted]);
    assert!(history[0].details.contains("scripted failure"));
    assert!(!ws.is_analysis_running());
}

#[tokio::test]
async fn test_failed_reanalysis_leaves_previous_conflicts() {
    let analyzer = ScriptedAnalyzer::new();
    analyzer.set("a", "b", Script::Conflicts(vec![Severity::High]));
    let ws = open(analyzer.clone());
    ws.analyze_batch(docs(&["a", "b"])).await.unwrap();
    let before = ws.conflicts().unwrap();

    analyzer.set("a", "b", Script::Fail);
    assert!(ws.analyze_pair("a", "b").await.unwrap_err().is_analyzer());
    assert_eq!(ws.conflicts().unwrap(), before);
}

#[tokio::test]
async fn test_malformed_candidates_abort_the_run() {
    let analyzer = ScriptedAnalyzer::new();
    analyzer.set("a", "b", Script::Malformed);
    let ws = open(analyzer.clone());

    let err = ws.analyze_batch(docs(&["a", "b"])).await.unwrap_err();
    assert!(matches!(err, DissonanceError::Analyzer(_)));
    assert!(!err.is_retryable());
    assert!(ws.conflicts().unwrap().is_empty());
    assert_eq!(ws.history().unwrap()[0].event_type, HistoryEventType::AnalysisError);
}

#[tokio::test]
async fn test_batch_validation_happens_before_side_effects() {
    let analyzer = ScriptedAnalyzer::new();
    let ws = open(analyzer.clone());

    let err = ws.analyze_batch(Vec::new()).await.unwrap_err();
    assert!(matches!(err, DissonanceError::Validation(ValidationError::EmptyBatch)));

    let err = ws.analyze_batch(docs(&["solo"])).await.unwrap_err();
    assert!(matches!(
        err,
        DissonanceError::Validation(ValidationError::NotEnoughDocuments { count: 1 })
    ));

    assert!(ws.documents().unwrap().is_empty());
    assert!(ws.history().unwrap().is_empty());
    assert!(analyzer.calls().is_empty());
    assert!(!ws.is_dirty());
}

#[tokio::test]
async fn test_duplicate_ids_reject_whole_batch() {
    let analyzer = ScriptedAnalyzer::new();
    let ws = open(analyzer.clone());
    ws.analyze_batch(docs(&["a", "b"])).await.unwrap();
    let history_len = ws.history().unwrap().len();

    let err = ws.analyze_batch(docs(&["c", "a"])).await.unwrap_err();
    assert!(err.is_duplicate_id());
    let err = ws.analyze_batch(docs(&["d", "d"])).await.unwrap_err();
    assert!(err.is_duplicate_id());

    assert_eq!(ws.documents().unwrap().len(), 2);
    assert_eq!(ws.history().unwrap().len(), history_len);
}

#[tokio::test]
async fn test_targeted_mode_rejects_bad_pairs() {
    let analyzer = ScriptedAnalyzer::new();
    let ws = open(analyzer.clone());
    ws.analyze_batch(docs(&["a", "b"])).await.unwrap();
    analyzer.clear_calls();

    let err = ws.analyze_pair("a", "a").await.unwrap_err();
    assert!(matches!(err, DissonanceError::Validation(ValidationError::SelfPair { .. })));

    let err = ws.analyze_pair("a", "zzz").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(analyzer.calls().is_empty());

    ws.analyze_pair("b", "a").await.unwrap();
    assert_eq!(analyzer.calls(), [("b".to_string(), "a".to_string())]);
}

#[tokio::test]
async fn test_resolution_lifecycle() {
    let analyzer = ScriptedAnalyzer::new();
    analyzer.set("d1", "d2", Script::Conflicts(vec![Severity::High]));
    let ws = open(analyzer.clone());
    ws.analyze_batch(docs(&["d1", "d2"])).await.unwrap();
    let c1 = ws.conflicts().unwrap()[0].id.clone();

    let outcome = ws.resolve(c1.as_str(), "accept_doc1").unwrap();
    assert_eq!(outcome, ResolveOutcome::Updated { previous: None });
    let events = ws.history().unwrap().len();

    assert_eq!(ws.resolve(c1.as_str(), "accept_first").unwrap(), ResolveOutcome::Unchanged);
    assert_eq!(ws.history().unwrap().len(), events);

    let outcome = ws.resolve(c1.as_str(), "accept_second").unwrap();
    assert_eq!(
        outcome,
        ResolveOutcome::Updated {
            previous: Some(Resolution::AcceptFirst)
        }
    );
    let history = ws.history().unwrap();
    assert_eq!(history.len(), events + 1);
    assert_eq!(history[0].event_type, HistoryEventType::ConflictResolved);

    let conflict = ws.store().conflict(&c1).unwrap().unwrap();
    assert_eq!(conflict.status, ConflictStatus::Resolved);
    assert_eq!(conflict.resolution, Some(Resolution::AcceptSecond));
    assert!(conflict.is_consistent());

    ws.resolve(c1.as_str(), "ignore").unwrap();
    let conflict = ws.store().conflict(&c1).unwrap().unwrap();
    assert_eq!(conflict.status, ConflictStatus::Ignored);
    assert!(conflict.is_consistent());
}

#[tokio::test]
async fn test_save_document_appends_history() {
    let analyzer = ScriptedAnalyzer::new();
    let ws = open(analyzer.clone());
    ws.analyze_batch(docs(&["a", "b"])).await.unwrap();

    let saved = ws.save_document("a", "rewritten").unwrap();
    assert_eq!(saved.content, "rewritten");
    assert_eq!(ws.store().document(&"a".into()).unwrap().unwrap().content, "rewritten");
    assert_eq!(ws.history().unwrap()[0].event_type, HistoryEventType::DocumentSaved);

    assert!(ws.save_document("nope", "x").unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_concurrent_run_is_rejected_not_queued() {
    let analyzer = GatedAnalyzer::new();
    let ws = Arc::new(open(analyzer.clone()));

    let running = {
        let ws = Arc::clone(&ws);
        tokio::spawn(async move { ws.analyze_batch(docs(&["a", "b"])).await })
    };
    analyzer.entered.notified().await;
    assert!(ws.is_analysis_running());

    let err = ws.analyze_batch(docs(&["c"])).await.unwrap_err();
    assert!(matches!(err, DissonanceError::Validation(ValidationError::AnalysisInProgress)));
    assert!(err.is_retryable());
    let err = ws.analyze_pair("a", "b").await.unwrap_err();
    assert!(matches!(err, DissonanceError::Validation(ValidationError::AnalysisInProgress)));

    analyzer.release.notify_one();
    let outcome = running.await.unwrap().unwrap();
    assert_eq!(outcome.pairs.len(), 1);
    assert!(!ws.is_analysis_running());
    assert_eq!(ws.documents().unwrap().len(), 2);

    // The slot is free again.
    analyzer.release.notify_one();
    ws.analyze_pair("a", "b").await.unwrap();
}

#[tokio::test]
async fn test_pair_calls_run_together_and_merge_once() {
    let analyzer = CountingGate::new(3);
    let ws = Arc::new(open(analyzer.clone()));

    let running = {
        let ws = Arc::clone(&ws);
        tokio::spawn(async move { ws.analyze_batch(docs(&["a", "b", "c"])).await })
    };

    // All three pair calls are parked at once: none waits on another.
    tokio::time::timeout(Duration::from_secs(5), analyzer.all_entered.notified())
        .await
        .expect("every pair call should be in flight");
    assert_eq!(analyzer.entered(), 3);

    // Nothing is merged while calls are pending.
    assert!(ws.conflicts().unwrap().is_empty());
    assert_eq!(ws.documents().unwrap().len(), 3);
    assert_eq!(ws.history().unwrap()[0].event_type, HistoryEventType::AnalysisStarted);

    analyzer.open();
    let outcome = running.await.unwrap().unwrap();
    assert_eq!(outcome.created.len(), 3);
    assert_eq!(ws.conflicts().unwrap().len(), 3);
    assert_eq!(ws.history().unwrap()[0].event_type, HistoryEventType::AnalysisComplete);
}
